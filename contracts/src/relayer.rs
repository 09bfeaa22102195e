//! # Relayer Module
//!
//! Meta-transactions: a third party (the relayer) submits a call that the
//! wallet's owner and/or guardians signed off-ledger, and is refunded from
//! the wallet for doing so.
//!
//! ## Relay pipeline
//!
//! ```text
//! RelayedCall
//!   -> resolve policy      (target module classifies the call)
//!   -> lock gate           (DisabledWhileLocked calls stop here)
//!   -> nonce check         (must equal the next expected nonce)
//!   -> signature check     (sorted by signer, verified, owner/guardians only)
//!   -> policy check        (signer set satisfies the policy)
//!   -> nonce += 1
//!   -> inner dispatch      (own frame: a failure rolls back only the call)
//!   -> TransactionExecuted(success)
//!   -> refund              (min(estimate, gas_limit) * gas_price)
//! ```
//!
//! Everything before the inner dispatch rejects the relay outright and
//! leaves no trace. Once the nonce is consumed the relayer is paid whether
//! or not the inner call succeeded. A refund the wallet cannot cover
//! reverts the whole relay, nonce included.
//!
//! ## Sign hash
//!
//! Signers sign [`RelayedCall::sign_hash`]: BLAKE3 in key-derivation mode
//! over the relayer address, the replay domain, the wallet, the target
//! module, the call data, the nonce and the refund terms.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warden_protocol::config::MAX_RELAY_SIGNATURES;
use warden_protocol::crypto::{domain_hash, verify_signer, Keypair, Signature};
use warden_protocol::Address;

use crate::error::WalletError;
use crate::events::WalletEvent;
use crate::ledger::{storage_key, Asset, CallContext, Ledger};
use crate::module::{
    add_module, decode_call, encode_call, CallPolicy, Caller, LockPolicy, Module, SignerSet,
};

const NONCE: &str = "relay-nonce";

/// BLAKE3 derive-key context for relay sign hashes.
const SIGN_HASH_CONTEXT: &str = "warden 2026-01 relayed call v1";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One signer's approval of a relayed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSignature {
    pub signer: Address,
    pub signature: Signature,
}

/// Who pays the relayer, and how much at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundInfo {
    /// Price per gas unit. `0` means no refund.
    pub gas_price: u64,
    /// Upper bound on the gas the wallet pays for.
    pub gas_limit: u64,
    pub asset: Asset,
    /// Beneficiary. `None` refunds whoever submits the relay.
    pub refund_address: Option<Address>,
}

impl RefundInfo {
    /// Fixed-width encoding bound into the sign hash.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(82);
        out.extend_from_slice(&self.gas_price.to_be_bytes());
        out.extend_from_slice(&self.gas_limit.to_be_bytes());
        match self.asset {
            Asset::Native => out.extend_from_slice(&[0; 33]),
            Asset::Token(token) => {
                out.push(1);
                out.extend_from_slice(token.as_bytes());
            }
        }
        match self.refund_address {
            None => out.extend_from_slice(&[0; 33]),
            Some(address) => {
                out.push(1);
                out.extend_from_slice(address.as_bytes());
            }
        }
        out
    }
}

impl Default for RefundInfo {
    fn default() -> Self {
        Self {
            gas_price: 0,
            gas_limit: 0,
            asset: Asset::Native,
            refund_address: None,
        }
    }
}

/// A signed instruction bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedCall {
    pub wallet: Address,
    pub target_module: Address,
    pub data: Vec<u8>,
    pub nonce: u64,
    pub refund: RefundInfo,
    /// Sorted by strictly increasing signer address.
    pub signatures: Vec<SignerSignature>,
}

impl RelayedCall {
    /// An unsigned call with no refund.
    pub fn new(wallet: Address, target_module: Address, data: Vec<u8>, nonce: u64) -> Self {
        Self {
            wallet,
            target_module,
            data,
            nonce,
            refund: RefundInfo::default(),
            signatures: Vec::new(),
        }
    }

    pub fn with_refund(mut self, refund: RefundInfo) -> Self {
        self.refund = refund;
        self
    }

    /// The digest every signer signs.
    pub fn sign_hash(&self, relayer: &Address, domain: u32) -> [u8; 32] {
        let refund = self.refund.to_bytes();
        domain_hash(
            SIGN_HASH_CONTEXT,
            &[
                relayer.as_bytes(),
                &domain.to_be_bytes(),
                self.wallet.as_bytes(),
                self.target_module.as_bytes(),
                &self.data,
                &self.nonce.to_be_bytes(),
                &refund,
            ],
        )
    }

    /// Replace the signatures with ones from `signers`, in canonical order.
    pub fn sign(mut self, relayer: &Address, domain: u32, signers: &[&Keypair]) -> Self {
        let hash = self.sign_hash(relayer, domain);
        let mut signatures: Vec<SignerSignature> = signers
            .iter()
            .map(|kp| SignerSignature {
                signer: kp.address(),
                signature: kp.sign(&hash),
            })
            .collect();
        signatures.sort_by(|a, b| a.signer.cmp(&b.signer));
        self.signatures = signatures;
        self
    }
}

/// Operations callable on the relayer itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayerCall {
    AddModule { wallet: Address, module: Address },
}

impl RelayerCall {
    pub fn wallet(&self) -> Address {
        match self {
            RelayerCall::AddModule { wallet, .. } => *wallet,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WalletError> {
        encode_call(self)
    }
}

pub struct RelayerModule {
    address: Address,
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl RelayerModule {
    pub fn new(label: &str) -> Self {
        Self {
            address: Address::derive("module", label),
        }
    }

    /// The nonce the next relayed call for `wallet` must carry.
    ///
    /// # Errors
    ///
    /// [`WalletError::InvalidCallData`] if the stored nonce is corrupt.
    pub fn nonce(&self, ledger: &Ledger, wallet: &Address) -> Result<u64, WalletError> {
        Ok(ledger
            .load(&self.address, &storage_key(NONCE, wallet, None))?
            .unwrap_or(0))
    }

    /// Submit a relayed call as `submitter`.
    ///
    /// Returns whether the inner call succeeded. An `Err` means the relay
    /// itself was rejected and nothing changed, the nonce included.
    ///
    /// # Errors
    ///
    /// - [`WalletError::UnknownWallet`], [`WalletError::ModuleNotAuthorised`],
    ///   [`WalletError::TargetWalletMismatch`] for a malformed bundle.
    /// - [`WalletError::WalletLocked`] for a call disabled while locked.
    /// - [`WalletError::InvalidNonce`] for a replayed or out-of-order nonce.
    /// - [`WalletError::InvalidSignatures`] or
    ///   [`WalletError::PolicyNotSatisfied`] for bad signatures.
    /// - [`WalletError::InsufficientFunds`] if the refund cannot be paid.
    pub fn execute(
        &self,
        ledger: &mut Ledger,
        submitter: Address,
        call: &RelayedCall,
    ) -> Result<bool, WalletError> {
        ledger.with_entered(call.wallet, |ledger| {
            ledger.atomically(|ledger| self.relay(ledger, submitter, call))
        })
    }

    fn relay(
        &self,
        ledger: &mut Ledger,
        submitter: Address,
        call: &RelayedCall,
    ) -> Result<bool, WalletError> {
        let wallet = call.wallet;
        if !ledger.wallet_exists(&wallet) {
            return Err(WalletError::UnknownWallet);
        }
        if !ledger.is_authorised(&wallet, &self.address)
            || !ledger.is_authorised(&wallet, &call.target_module)
        {
            return Err(WalletError::ModuleNotAuthorised);
        }
        let target = ledger.module(&call.target_module)?;
        if target.target_wallet(&call.data)? != wallet {
            return Err(WalletError::TargetWalletMismatch);
        }
        let policy = target.required_signatures(ledger, &wallet, &call.data)?;

        if policy.lock == LockPolicy::DisabledWhileLocked && ledger.is_locked(&wallet) {
            return Err(WalletError::WalletLocked);
        }

        let expected = self.nonce(ledger, &wallet)?;
        if call.nonce != expected {
            return Err(WalletError::InvalidNonce {
                expected,
                got: call.nonce,
            });
        }

        let sign_hash = call.sign_hash(&self.address, ledger.config().relay_domain);
        let signers = self.verify_signatures(ledger, &wallet, &sign_hash, &call.signatures)?;
        policy.signers.check(&signers)?;

        let next = expected.checked_add(1).ok_or(WalletError::Overflow)?;
        ledger.store(self.address, storage_key(NONCE, &wallet, None), &next)?;

        let caller = Caller::Relayed {
            wallet,
            relayer: self.address,
            signers,
        };
        let inner = ledger.atomically(|ledger| ledger.dispatch(caller, call.target_module, &call.data));
        let success = match inner {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    wallet = %wallet,
                    module = %call.target_module,
                    nonce = call.nonce,
                    error = %e,
                    "relayed call failed"
                );
                false
            }
        };
        ledger.emit(WalletEvent::TransactionExecuted {
            wallet,
            success,
            sign_hash,
        });

        self.refund(ledger, submitter, call)?;
        info!(wallet = %wallet, nonce = call.nonce, success, "relayed call executed");
        Ok(success)
    }

    /// Check the signature list and classify its signers.
    fn verify_signatures(
        &self,
        ledger: &Ledger,
        wallet: &Address,
        sign_hash: &[u8; 32],
        signatures: &[SignerSignature],
    ) -> Result<SignerSet, WalletError> {
        if signatures.len() > MAX_RELAY_SIGNATURES {
            return Err(WalletError::TooManySignatures {
                count: signatures.len(),
                max: MAX_RELAY_SIGNATURES,
            });
        }
        let owner = ledger.owner(wallet)?;
        let mut set = SignerSet::default();
        let mut previous: Option<Address> = None;
        for entry in signatures {
            if previous.is_some_and(|p| entry.signer <= p) {
                return Err(WalletError::InvalidSignatures);
            }
            previous = Some(entry.signer);
            verify_signer(&entry.signer, sign_hash, &entry.signature)
                .map_err(|_| WalletError::InvalidSignatures)?;

            if entry.signer == owner {
                set.owner_signed = true;
                continue;
            }
            // A guardian counts once, however it is reached.
            match ledger.resolve_guardian(wallet, &entry.signer) {
                Some(guardian) if !set.guardians.contains(&guardian) => {
                    set.guardians.push(guardian)
                }
                _ => return Err(WalletError::InvalidSignatures),
            }
        }
        debug!(
            wallet = %wallet,
            owner_signed = set.owner_signed,
            guardians = set.guardians.len(),
            "relay signatures verified"
        );
        Ok(set)
    }

    fn refund(
        &self,
        ledger: &mut Ledger,
        submitter: Address,
        call: &RelayedCall,
    ) -> Result<(), WalletError> {
        let refund = call.refund;
        if refund.gas_price == 0 {
            return Ok(());
        }
        let config = ledger.config();
        let estimate = config
            .relay_gas_per_signature
            .checked_mul(call.signatures.len() as u64)
            .and_then(|g| {
                config
                    .relay_gas_per_data_byte
                    .checked_mul(call.data.len() as u64)
                    .and_then(|d| g.checked_add(d))
            })
            .and_then(|g| g.checked_add(config.relay_base_gas))
            .ok_or(WalletError::Overflow)?;
        let amount = estimate
            .min(refund.gas_limit)
            .checked_mul(refund.gas_price)
            .ok_or(WalletError::Overflow)?;
        let refund_address = refund.refund_address.unwrap_or(submitter);
        ledger.transfer(call.wallet, refund_address, refund.asset, amount)?;
        ledger.emit(WalletEvent::Refund {
            wallet: call.wallet,
            refund_address,
            asset: refund.asset,
            amount,
        });
        Ok(())
    }
}

impl Module for RelayerModule {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &str {
        "RelayerModule"
    }

    fn target_wallet(&self, data: &[u8]) -> Result<Address, WalletError> {
        Ok(decode_call::<RelayerCall>(data)?.wallet())
    }

    fn required_signatures(
        &self,
        _ledger: &Ledger,
        _wallet: &Address,
        data: &[u8],
    ) -> Result<CallPolicy, WalletError> {
        decode_call::<RelayerCall>(data)?;
        Ok(CallPolicy::owner_unlocked())
    }

    fn execute(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), WalletError> {
        match decode_call(data)? {
            RelayerCall::AddModule { wallet, module } => add_module(ctx, wallet, module),
        }
    }
}
