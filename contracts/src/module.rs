//! # Modules
//!
//! Modules hold all wallet policy. A module is a stateless object
//! (configuration aside) deployed once on the [`Ledger`] and shared by every
//! wallet that authorises it. Per-wallet state lives in the module's storage
//! namespace on the ledger, reached through [`CallContext`].
//!
//! Every module:
//!
//! 1. decodes its own call data (a serde enum encoded with bincode),
//! 2. names the wallet each call targets,
//! 3. classifies each call into a [`CallPolicy`] so the relayer knows which
//!    signatures to demand, and
//! 4. checks direct callers itself, since direct calls skip the relayer.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use warden_protocol::Address;

use crate::error::WalletError;
use crate::ledger::{CallContext, Ledger};

// ---------------------------------------------------------------------------
// Callers and policies
// ---------------------------------------------------------------------------

/// Signers the relayer verified for one relayed call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSet {
    pub owner_signed: bool,
    /// Distinct guardians that approved, after wallet-guardian resolution.
    pub guardians: Vec<Address>,
}

/// Who is driving a module call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// A direct transaction from an account (or an external contract).
    Account(Address),
    /// A meta-transaction whose signatures the relayer already checked
    /// against the call's policy.
    Relayed {
        wallet: Address,
        relayer: Address,
        signers: SignerSet,
    },
}

impl Caller {
    /// True when the caller is a relayed call on behalf of `wallet`.
    pub fn is_relayed_for(&self, wallet: &Address) -> bool {
        matches!(self, Caller::Relayed { wallet: w, .. } if w == wallet)
    }
}

/// Which signatures a relayed call needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerPolicy {
    OwnerOnly,
    OwnerAndGuardians(usize),
    GuardiansOnly(usize),
    OwnerOrGuardians(usize),
    /// No signature required (e.g. finalizing a matured recovery).
    Anyone,
}

impl SignerPolicy {
    /// Check verified signers against the policy.
    ///
    /// # Errors
    ///
    /// [`WalletError::PolicyNotSatisfied`] when the signer set falls short.
    pub fn check(&self, signers: &SignerSet) -> Result<(), WalletError> {
        let guardians = signers.guardians.len();
        let satisfied = match *self {
            SignerPolicy::OwnerOnly => signers.owner_signed && guardians == 0,
            SignerPolicy::OwnerAndGuardians(k) => signers.owner_signed && guardians >= k,
            SignerPolicy::GuardiansOnly(k) => !signers.owner_signed && guardians >= k,
            SignerPolicy::OwnerOrGuardians(k) => signers.owner_signed || guardians >= k,
            SignerPolicy::Anyone => true,
        };
        if satisfied {
            Ok(())
        } else {
            Err(WalletError::PolicyNotSatisfied)
        }
    }
}

/// Whether a call is allowed while the wallet is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    DisabledWhileLocked,
    AllowedWhileLocked,
}

/// Full classification of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub signers: SignerPolicy,
    pub lock: LockPolicy,
}

impl CallPolicy {
    pub const fn new(signers: SignerPolicy, lock: LockPolicy) -> Self {
        Self { signers, lock }
    }

    /// Owner-signed and disabled while locked: the default for
    /// configuration changes.
    pub const fn owner_unlocked() -> Self {
        Self::new(SignerPolicy::OwnerOnly, LockPolicy::DisabledWhileLocked)
    }
}

/// Strict majority of `count` guardians. An even count needs more than half.
pub fn guardian_majority(count: usize) -> usize {
    count / 2 + 1
}

/// Half of `count`, rounded up.
pub fn half_rounded_up(count: usize) -> usize {
    count.div_ceil(2)
}

// ---------------------------------------------------------------------------
// Module trait
// ---------------------------------------------------------------------------

pub trait Module: Send + Sync {
    fn address(&self) -> Address;

    fn name(&self) -> &str;

    /// Runs when the module is authorised on `wallet`, inside the same
    /// atomic frame as the authorisation.
    fn init(&self, _ctx: &mut CallContext<'_>, _wallet: Address) -> Result<(), WalletError> {
        Ok(())
    }

    /// The wallet an encoded call acts on.
    fn target_wallet(&self, data: &[u8]) -> Result<Address, WalletError>;

    /// Signature and lock policy for an encoded call.
    fn required_signatures(
        &self,
        ledger: &Ledger,
        wallet: &Address,
        data: &[u8],
    ) -> Result<CallPolicy, WalletError>;

    fn execute(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), WalletError>;
}

// ---------------------------------------------------------------------------
// Call encoding
// ---------------------------------------------------------------------------

/// Encode a module call enum.
///
/// # Errors
///
/// [`WalletError::Encoding`] if the value does not serialize.
pub fn encode_call<T: Serialize>(call: &T) -> Result<Vec<u8>, WalletError> {
    bincode::serialize(call).map_err(|e| WalletError::Encoding(e.to_string()))
}

/// Decode a module call enum.
///
/// # Errors
///
/// [`WalletError::InvalidCallData`] for bytes that do not decode.
pub fn decode_call<T: DeserializeOwned>(data: &[u8]) -> Result<T, WalletError> {
    bincode::deserialize(data).map_err(|e| WalletError::InvalidCallData(e.to_string()))
}

// ---------------------------------------------------------------------------
// Shared operations
// ---------------------------------------------------------------------------

/// `addModule`, shared by every core module except the Upgrader: the owner
/// authorises another registered module while the wallet is unlocked.
pub fn add_module(
    ctx: &mut CallContext<'_>,
    wallet: Address,
    module: Address,
) -> Result<(), WalletError> {
    ctx.require_owner(&wallet)?;
    ctx.require_unlocked(&wallet)?;
    if !ctx.ledger().registry().is_registered(&module) {
        return Err(WalletError::ModuleNotRegistered);
    }
    if ctx.ledger().is_authorised(&wallet, &module) {
        return Err(WalletError::ModuleAlreadyAdded);
    }
    ctx.authorise_module(wallet, module, true)
}
