//! Integration tests for atomic module swaps.

mod common;

use std::sync::Arc;

use common::{keypair, Fixture};
use warden_contracts::guardian_manager::GuardianManagerCall;
use warden_contracts::lock_manager::{LockManager, LockManagerCall};
use warden_contracts::relayer::RelayerCall;
use warden_contracts::upgrader::Upgrader;
use warden_contracts::{WalletError, WalletEvent};
use warden_protocol::Address;

/// Deploy and register a second-generation lock manager.
fn deploy_lock_manager_v2(fx: &mut Fixture) -> Address {
    let address = fx
        .ledger
        .deploy_module(Arc::new(LockManager::new("LockManager-v2")));
    let registrar = fx.registrar;
    fx.ledger
        .register_module(registrar, address, "LockManager-v2")
        .unwrap();
    address
}

fn deploy_upgrader(fx: &mut Fixture, label: &str, to_remove: &[Address], to_add: &[Address]) -> Address {
    let address = fx
        .ledger
        .deploy_module(Arc::new(Upgrader::new(label, to_remove, to_add)));
    let registrar = fx.registrar;
    fx.ledger.register_upgrader(registrar, address, label).unwrap();
    address
}

fn add_module(fx: &mut Fixture, module: Address) -> Result<(), WalletError> {
    let (owner, gm, wallet) = (fx.owner.address(), fx.gm(), fx.wallet);
    let call = GuardianManagerCall::AddModule { wallet, module };
    fx.ledger.call(owner, gm, &call.encode().unwrap())
}

#[test]
fn upgrade_swaps_modules_and_removes_itself() {
    let mut fx = Fixture::new();
    let wallet = fx.wallet;
    let (lm, lm2) = (fx.lm(), deploy_lock_manager_v2(&mut fx));
    let upgrader = deploy_upgrader(&mut fx, "lock-v1-to-v2", &[lm], &[lm2, lm2]);
    fx.ledger.take_events();

    add_module(&mut fx, upgrader).unwrap();

    let modules = fx.ledger.modules(&wallet);
    assert!(modules.contains(&lm2));
    assert!(!modules.contains(&lm));
    assert!(!modules.contains(&upgrader));
    assert_eq!(modules.len(), 4);

    // Additions land before removals; the upgrader goes last.
    assert_eq!(
        fx.ledger.take_events(),
        vec![
            WalletEvent::AuthorisedModule { wallet, module: upgrader, value: true },
            WalletEvent::AuthorisedModule { wallet, module: lm2, value: true },
            WalletEvent::AuthorisedModule { wallet, module: lm, value: false },
            WalletEvent::AuthorisedModule { wallet, module: upgrader, value: false },
        ]
    );
}

#[test]
fn upgraded_module_is_usable() {
    let mut fx = Fixture::new();
    let wallet = fx.wallet;
    let g = fx.add_guardians(1);
    let (lm, lm2) = (fx.lm(), deploy_lock_manager_v2(&mut fx));
    let upgrader = deploy_upgrader(&mut fx, "lock-v1-to-v2", &[lm], &[lm2]);
    add_module(&mut fx, upgrader).unwrap();

    let lock = LockManagerCall::Lock { wallet }.encode().unwrap();
    assert_eq!(
        fx.ledger.call(g[0].address(), lm, &lock),
        Err(WalletError::ModuleNotAuthorised)
    );
    fx.ledger.call(g[0].address(), lm2, &lock).unwrap();
    assert!(fx.ledger.is_locked(&wallet));
}

#[test]
fn upgrade_leaving_no_module_reverts_completely() {
    let mut fx = Fixture::new();
    let wallet = fx.wallet;
    let everything = fx.module_addresses();
    let upgrader = deploy_upgrader(&mut fx, "scorched-earth", &everything, &[]);
    fx.ledger.take_events();
    let before = fx.ledger.modules(&wallet);

    let err = add_module(&mut fx, upgrader).unwrap_err();
    assert_eq!(err, WalletError::ZeroModules);
    assert_eq!(err.to_string(), "cannot assign with less than 1 module");
    assert_eq!(fx.ledger.modules(&wallet), before);
    assert!(fx.ledger.events().is_empty());
}

#[test]
fn upgrade_adding_unregistered_module_fails() {
    let mut fx = Fixture::new();
    let wallet = fx.wallet;
    let rogue = fx
        .ledger
        .deploy_module(Arc::new(LockManager::new("rogue")));
    let upgrader = deploy_upgrader(&mut fx, "rogue-upgrade", &[], &[rogue]);
    let before = fx.ledger.modules(&wallet);

    let err = add_module(&mut fx, upgrader).unwrap_err();
    assert_eq!(err.to_string(), "Not all modules are registered");
    assert_eq!(fx.ledger.modules(&wallet), before);
}

#[test]
fn unregistered_upgrader_cannot_be_added() {
    let mut fx = Fixture::new();
    let lm2 = deploy_lock_manager_v2(&mut fx);
    let lm = fx.lm();
    let upgrader = fx
        .ledger
        .deploy_module(Arc::new(Upgrader::new("unlisted", &[lm], &[lm2])));
    assert_eq!(
        add_module(&mut fx, upgrader),
        Err(WalletError::ModuleNotRegistered)
    );
}

#[test]
fn upgrade_is_refused_while_locked() {
    let mut fx = Fixture::new();
    let wallet = fx.wallet;
    let g = fx.add_guardians(1);
    let (lm, lm2) = (fx.lm(), deploy_lock_manager_v2(&mut fx));
    let upgrader = deploy_upgrader(&mut fx, "lock-v1-to-v2", &[lm], &[lm2]);
    fx.ledger
        .call(g[0].address(), lm, &LockManagerCall::Lock { wallet }.encode().unwrap())
        .unwrap();
    assert_eq!(add_module(&mut fx, upgrader), Err(WalletError::WalletLocked));
}

#[test]
fn owner_upgrades_through_relayer() {
    let mut fx = Fixture::new();
    let wallet = fx.wallet;
    let (lm, lm2) = (fx.lm(), deploy_lock_manager_v2(&mut fx));
    let upgrader = deploy_upgrader(&mut fx, "lock-v1-to-v2", &[lm], &[lm2]);
    let (relayer, owner) = (fx.relayer_address(), fx.owner.clone());
    let call = RelayerCall::AddModule {
        wallet,
        module: upgrader,
    };
    assert_eq!(fx.relay(relayer, call.encode().unwrap(), &[&owner]), Ok(true));
    assert!(fx.ledger.is_authorised(&wallet, &lm2));
    assert!(!fx.ledger.is_authorised(&wallet, &upgrader));
}

#[test]
fn upgrader_has_no_operations() {
    let mut fx = Fixture::new();
    let upgrader = deploy_upgrader(&mut fx, "noop", &[], &[]);
    assert_eq!(
        fx.ledger.call(keypair(1).address(), upgrader, &[]),
        Err(WalletError::NotCallable)
    );
}
