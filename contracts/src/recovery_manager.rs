//! # Recovery Manager
//!
//! Social recovery: a majority of guardians replaces a wallet's owner.
//!
//! ```text
//! NoRecovery --execute (guardian majority)--> Pending --recovery_period--> Finalizable
//! Pending | Finalizable --cancel (owner or guardian majority)--> NoRecovery
//! Finalizable --finalize (anyone)--> NoRecovery, owner replaced
//! ```
//!
//! Executing a recovery locks the wallet for `lock_period` in the recovery
//! manager's name, so nothing else (module changes, guardian changes, a
//! guardian unlock) can happen until the recovery is finalized or cancelled.
//!
//! Recovery operations that need signatures only arrive through the relayer;
//! the verified guardian set becomes the recovery's approvals.
//!
//! `transfer_ownership` is the cooperative path: the current owner plus half
//! the guardians (rounded up) hand the wallet to a new key immediately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use warden_protocol::Address;

use crate::error::WalletError;
use crate::events::WalletEvent;
use crate::ledger::{storage_key, CallContext, Ledger};
use crate::module::{
    add_module, decode_call, encode_call, guardian_majority, half_rounded_up, CallPolicy,
    LockPolicy, Module, SignerPolicy,
};

const RECOVERY: &str = "recovery";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryManagerCall {
    AddModule { wallet: Address, module: Address },
    ExecuteRecovery { wallet: Address, recovery: Address },
    FinalizeRecovery { wallet: Address },
    CancelRecovery { wallet: Address },
    TransferOwnership { wallet: Address, new_owner: Address },
}

impl RecoveryManagerCall {
    pub fn wallet(&self) -> Address {
        use RecoveryManagerCall::*;
        match self {
            AddModule { wallet, .. }
            | ExecuteRecovery { wallet, .. }
            | FinalizeRecovery { wallet }
            | CancelRecovery { wallet }
            | TransferOwnership { wallet, .. } => *wallet,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WalletError> {
        encode_call(self)
    }
}

/// An in-flight recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecovery {
    /// The owner the wallet will have once finalized.
    pub candidate_owner: Address,
    pub execute_after: DateTime<Utc>,
    /// Guardians whose signatures started the recovery.
    pub guardian_approvals: Vec<Address>,
    /// Guardian count when the recovery started.
    pub guardian_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryState {
    NoRecovery,
    Pending,
    Finalizable,
}

impl std::fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryState::NoRecovery => write!(f, "NoRecovery"),
            RecoveryState::Pending => write!(f, "Pending"),
            RecoveryState::Finalizable => write!(f, "Finalizable"),
        }
    }
}

pub struct RecoveryManager {
    address: Address,
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl RecoveryManager {
    pub fn new(label: &str) -> Self {
        Self {
            address: Address::derive("module", label),
        }
    }

    /// The in-flight recovery for `wallet`, if any.
    ///
    /// # Errors
    ///
    /// [`WalletError::InvalidCallData`] if the stored record is corrupt.
    pub fn get_recovery(
        &self,
        ledger: &Ledger,
        wallet: &Address,
    ) -> Result<Option<PendingRecovery>, WalletError> {
        ledger.load(&self.address, &storage_key(RECOVERY, wallet, None))
    }

    pub fn recovery_state(
        &self,
        ledger: &Ledger,
        wallet: &Address,
    ) -> Result<RecoveryState, WalletError> {
        Ok(match self.get_recovery(ledger, wallet)? {
            None => RecoveryState::NoRecovery,
            Some(r) if ledger.now() < r.execute_after => RecoveryState::Pending,
            Some(_) => RecoveryState::Finalizable,
        })
    }

    fn execute_recovery(
        &self,
        ctx: &mut CallContext<'_>,
        wallet: Address,
        recovery: Address,
    ) -> Result<(), WalletError> {
        let signers = ctx.require_relayed(&wallet)?;
        let key = storage_key(RECOVERY, &wallet, None);
        if ctx.load::<PendingRecovery>(&key)?.is_some() {
            return Err(WalletError::RecoveryOngoing);
        }
        validate_new_owner(ctx.ledger(), &wallet, &recovery)?;

        let now = ctx.now();
        let pending = PendingRecovery {
            candidate_owner: recovery,
            execute_after: now + ctx.config().recovery_period(),
            guardian_approvals: signers.guardians,
            guardian_count: ctx.ledger().guardian_count(&wallet),
        };
        ctx.set_lock(wallet, now + ctx.config().lock_period())?;
        ctx.store(key, &pending)?;
        info!(
            wallet = %wallet,
            recovery = %recovery,
            approvals = pending.guardian_approvals.len(),
            "recovery executed"
        );
        ctx.emit(WalletEvent::RecoveryExecuted {
            wallet,
            recovery,
            execute_after: pending.execute_after,
        });
        Ok(())
    }

    fn finalize_recovery(&self, ctx: &mut CallContext<'_>, wallet: Address) -> Result<(), WalletError> {
        let key = storage_key(RECOVERY, &wallet, None);
        let pending = ctx
            .load::<PendingRecovery>(&key)?
            .ok_or(WalletError::NoOngoingRecovery)?;
        if ctx.now() < pending.execute_after {
            return Err(WalletError::RecoveryPeriodNotOver);
        }
        ctx.erase(&key);
        self.release_lock(ctx, wallet)?;
        ctx.set_owner(wallet, pending.candidate_owner)?;
        info!(wallet = %wallet, owner = %pending.candidate_owner, "recovery finalized");
        ctx.emit(WalletEvent::RecoveryFinalized {
            wallet,
            recovery: pending.candidate_owner,
        });
        Ok(())
    }

    fn cancel_recovery(&self, ctx: &mut CallContext<'_>, wallet: Address) -> Result<(), WalletError> {
        ctx.require_relayed(&wallet)?;
        let key = storage_key(RECOVERY, &wallet, None);
        let pending = ctx
            .load::<PendingRecovery>(&key)?
            .ok_or(WalletError::NoOngoingRecovery)?;
        ctx.erase(&key);
        self.release_lock(ctx, wallet)?;
        info!(wallet = %wallet, recovery = %pending.candidate_owner, "recovery cancelled");
        ctx.emit(WalletEvent::RecoveryCanceled {
            wallet,
            recovery: pending.candidate_owner,
        });
        Ok(())
    }

    fn transfer_ownership(
        &self,
        ctx: &mut CallContext<'_>,
        wallet: Address,
        new_owner: Address,
    ) -> Result<(), WalletError> {
        ctx.require_relayed(&wallet)?;
        ctx.require_unlocked(&wallet)?;
        validate_new_owner(ctx.ledger(), &wallet, &new_owner)?;
        ctx.set_owner(wallet, new_owner)?;
        info!(wallet = %wallet, owner = %new_owner, "ownership transferred");
        ctx.emit(WalletEvent::OwnershipTransferred { wallet, new_owner });
        Ok(())
    }

    /// Drop the recovery lock if it is still ours. A lock placed by another
    /// module after ours expired stays in place.
    fn release_lock(&self, ctx: &mut CallContext<'_>, wallet: Address) -> Result<(), WalletError> {
        let ours = ctx
            .ledger()
            .lock(&wallet)
            .is_some_and(|l| l.locked_by == self.address);
        if ours {
            ctx.clear_lock(wallet)?;
        }
        Ok(())
    }
}

fn validate_new_owner(
    ledger: &Ledger,
    wallet: &Address,
    candidate: &Address,
) -> Result<(), WalletError> {
    if candidate.is_zero() {
        return Err(WalletError::InvalidNewOwner("new owner cannot be null"));
    }
    if *candidate == ledger.owner(wallet)? {
        return Err(WalletError::InvalidNewOwner("new owner is already the owner"));
    }
    if ledger.is_guardian(wallet, candidate) {
        return Err(WalletError::InvalidNewOwner("new owner cannot be a guardian"));
    }
    Ok(())
}

impl Module for RecoveryManager {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &str {
        "RecoveryManager"
    }

    fn target_wallet(&self, data: &[u8]) -> Result<Address, WalletError> {
        Ok(decode_call::<RecoveryManagerCall>(data)?.wallet())
    }

    fn required_signatures(
        &self,
        ledger: &Ledger,
        wallet: &Address,
        data: &[u8],
    ) -> Result<CallPolicy, WalletError> {
        use RecoveryManagerCall::*;
        let guardians = ledger.guardian_count(wallet);
        Ok(match decode_call::<RecoveryManagerCall>(data)? {
            AddModule { .. } => CallPolicy::owner_unlocked(),
            ExecuteRecovery { .. } => CallPolicy::new(
                SignerPolicy::GuardiansOnly(guardian_majority(guardians)),
                LockPolicy::DisabledWhileLocked,
            ),
            FinalizeRecovery { .. } => {
                CallPolicy::new(SignerPolicy::Anyone, LockPolicy::AllowedWhileLocked)
            }
            CancelRecovery { .. } => CallPolicy::new(
                SignerPolicy::OwnerOrGuardians(guardian_majority(guardians)),
                LockPolicy::AllowedWhileLocked,
            ),
            TransferOwnership { .. } => CallPolicy::new(
                SignerPolicy::OwnerAndGuardians(half_rounded_up(guardians)),
                LockPolicy::DisabledWhileLocked,
            ),
        })
    }

    fn execute(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), WalletError> {
        use RecoveryManagerCall::*;
        match decode_call(data)? {
            AddModule { wallet, module } => add_module(ctx, wallet, module),
            ExecuteRecovery { wallet, recovery } => self.execute_recovery(ctx, wallet, recovery),
            FinalizeRecovery { wallet } => self.finalize_recovery(ctx, wallet),
            CancelRecovery { wallet } => self.cancel_recovery(ctx, wallet),
            TransferOwnership { wallet, new_owner } => {
                self.transfer_ownership(ctx, wallet, new_owner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_protocol::{CoreConfig, ManualClock};

    #[test]
    fn quorum_tracks_guardian_count() {
        // No wallet: guardian count reads as zero.
        let ledger = Ledger::new(
            CoreConfig::default(),
            Arc::new(ManualClock::starting_now()),
            Address::derive("account", "registrar"),
        )
        .unwrap();
        let manager = RecoveryManager::new("RecoveryManager");
        let wallet = Address::derive("wallet", "w");
        let execute = RecoveryManagerCall::ExecuteRecovery {
            wallet,
            recovery: Address::derive("account", "r"),
        };
        let policy = manager
            .required_signatures(&ledger, &wallet, &execute.encode().unwrap())
            .unwrap();
        assert_eq!(policy.signers, SignerPolicy::GuardiansOnly(1));

        let transfer = RecoveryManagerCall::TransferOwnership {
            wallet,
            new_owner: Address::derive("account", "n"),
        };
        let policy = manager
            .required_signatures(&ledger, &wallet, &transfer.encode().unwrap())
            .unwrap();
        assert_eq!(policy.signers, SignerPolicy::OwnerAndGuardians(0));
    }

    #[test]
    fn corrupt_recovery_record_is_an_error() {
        let mut ledger = Ledger::new(
            CoreConfig::default(),
            Arc::new(ManualClock::starting_now()),
            Address::derive("account", "registrar"),
        )
        .unwrap();
        let manager = RecoveryManager::new("RecoveryManager");
        let wallet = Address::derive("wallet", "w");
        ledger
            .store(manager.address(), storage_key(RECOVERY, &wallet, None), &7u8)
            .unwrap();
        assert!(matches!(
            manager.get_recovery(&ledger, &wallet),
            Err(WalletError::InvalidCallData(_))
        ));
        assert!(manager.recovery_state(&ledger, &wallet).is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(RecoveryState::Finalizable.to_string(), "Finalizable");
    }
}
