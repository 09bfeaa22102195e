//! Shared fixture for the integration tests: a ledger with every core
//! module deployed and registered, and one wallet that authorises them all.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;
use warden_contracts::guardian_manager::{GuardianManager, GuardianManagerCall};
use warden_contracts::ledger::{Asset, Ledger};
use warden_contracts::lock_manager::LockManager;
use warden_contracts::recovery_manager::RecoveryManager;
use warden_contracts::relayer::{RefundInfo, RelayedCall, RelayerModule};
use warden_contracts::{Module, WalletError};
use warden_protocol::crypto::Keypair;
use warden_protocol::{Address, CoreConfig, ManualClock};

pub struct Fixture {
    pub ledger: Ledger,
    pub clock: ManualClock,
    pub registrar: Address,
    pub relayer: Arc<RelayerModule>,
    pub guardian_manager: Arc<GuardianManager>,
    pub lock_manager: Arc<LockManager>,
    pub recovery_manager: Arc<RecoveryManager>,
    pub owner: Keypair,
    pub wallet: Address,
    /// Account that submits relayed calls.
    pub submitter: Address,
}

pub fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

impl Fixture {
    pub fn new() -> Self {
        let clock = ManualClock::starting_now();
        let registrar = Address::derive("account", "registrar");
        let mut ledger = Ledger::new(CoreConfig::default(), Arc::new(clock.clone()), registrar)
            .expect("default config is valid");

        let relayer = Arc::new(RelayerModule::new("RelayerModule"));
        let guardian_manager = Arc::new(GuardianManager::new("GuardianManager"));
        let lock_manager = Arc::new(LockManager::new("LockManager"));
        let recovery_manager = Arc::new(RecoveryManager::new("RecoveryManager"));

        let modules = [
            (ledger.deploy_module(relayer.clone()), "RelayerModule"),
            (ledger.deploy_module(guardian_manager.clone()), "GuardianManager"),
            (ledger.deploy_module(lock_manager.clone()), "LockManager"),
            (ledger.deploy_module(recovery_manager.clone()), "RecoveryManager"),
        ];
        for (module, name) in &modules {
            ledger.register_module(registrar, *module, name).unwrap();
        }

        let owner = keypair(1);
        let addresses: Vec<Address> = modules.iter().map(|(m, _)| *m).collect();
        let wallet = ledger.create_wallet(owner.address(), &addresses).unwrap();
        ledger.take_events();

        Self {
            ledger,
            clock,
            registrar,
            relayer,
            guardian_manager,
            lock_manager,
            recovery_manager,
            owner,
            wallet,
            submitter: Address::derive("account", "submitter"),
        }
    }

    pub fn module_addresses(&self) -> Vec<Address> {
        vec![
            self.relayer.address(),
            self.guardian_manager.address(),
            self.lock_manager.address(),
            self.recovery_manager.address(),
        ]
    }

    pub fn gm(&self) -> Address {
        self.guardian_manager.address()
    }

    pub fn lm(&self) -> Address {
        self.lock_manager.address()
    }

    pub fn rm(&self) -> Address {
        self.recovery_manager.address()
    }

    pub fn relayer_address(&self) -> Address {
        self.relayer.address()
    }

    /// Add `count` EOA guardians (seeds 10, 11, ...) through the full
    /// request/confirm flow, as the owner.
    pub fn add_guardians(&mut self, count: u8) -> Vec<Keypair> {
        let guardians: Vec<Keypair> = (0..count).map(|i| keypair(10 + i)).collect();
        let owner = self.owner.address();
        let gm = self.gm();
        let wallet = self.wallet;
        for g in &guardians {
            let call = GuardianManagerCall::AddGuardian {
                wallet,
                guardian: g.address(),
            };
            self.ledger.call(owner, gm, &call.encode().unwrap()).unwrap();
        }
        if count > 1 {
            self.advance(Duration::seconds(
                self.ledger.config().security_period_secs as i64,
            ));
            for g in guardians.iter().skip(1) {
                let call = GuardianManagerCall::ConfirmGuardianAddition {
                    wallet,
                    guardian: g.address(),
                };
                self.ledger.call(owner, gm, &call.encode().unwrap()).unwrap();
            }
        }
        assert_eq!(self.ledger.guardian_count(&wallet), count as usize);
        self.ledger.take_events();
        guardians
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn next_nonce(&self) -> u64 {
        self.relayer.nonce(&self.ledger, &self.wallet).unwrap()
    }

    /// A call to `module` at the next nonce, signed by `signers`.
    pub fn signed(&self, module: Address, data: Vec<u8>, signers: &[&Keypair]) -> RelayedCall {
        let domain = self.ledger.config().relay_domain;
        RelayedCall::new(self.wallet, module, data, self.next_nonce()).sign(
            &self.relayer_address(),
            domain,
            signers,
        )
    }

    /// Like [`Fixture::signed`] with refund terms.
    pub fn signed_with_refund(
        &self,
        module: Address,
        data: Vec<u8>,
        refund: RefundInfo,
        signers: &[&Keypair],
    ) -> RelayedCall {
        let domain = self.ledger.config().relay_domain;
        RelayedCall::new(self.wallet, module, data, self.next_nonce())
            .with_refund(refund)
            .sign(&self.relayer_address(), domain, signers)
    }

    pub fn submit(&mut self, call: &RelayedCall) -> Result<bool, WalletError> {
        let submitter = self.submitter;
        self.relayer.execute(&mut self.ledger, submitter, call)
    }

    /// Sign and submit in one step.
    pub fn relay(
        &mut self,
        module: Address,
        data: Vec<u8>,
        signers: &[&Keypair],
    ) -> Result<bool, WalletError> {
        let call = self.signed(module, data, signers);
        self.submit(&call)
    }

    pub fn fund(&mut self, amount: u64) {
        self.ledger.deposit(self.wallet, Asset::Native, amount).unwrap();
    }
}
