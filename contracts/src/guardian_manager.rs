//! # Guardian Manager
//!
//! Adds and revokes guardians with a commit-delay-confirm pattern:
//!
//! 1. **Request**: the owner asks to add (or revoke) a guardian. The change
//!    is recorded as pending with `confirm_after = now + security_period`
//!    and `expires_at = confirm_after + security_window`.
//! 2. **Delay**: nothing happens for the security period.
//! 3. **Confirm**: the owner confirms inside `[confirm_after, expires_at)`.
//!    Outside that window the confirmation fails; an expired request may be
//!    submitted again.
//!
//! The one exception is a wallet's *first* guardian, which is added
//! immediately. Once a wallet has a guardian, a stolen owner key cannot
//! silently strip recovery: every change sits in plain view for a full
//! security period, long enough for guardians to lock the wallet.
//!
//! Every operation is owner-only and disabled while the wallet is locked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use warden_protocol::Address;

use crate::error::WalletError;
use crate::events::WalletEvent;
use crate::ledger::{storage_key, CallContext, Ledger};
use crate::module::{add_module, decode_call, encode_call, CallPolicy, Module};

const ADDITION: &str = "guardian-addition";
const REVOCATION: &str = "guardian-revocation";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardianManagerCall {
    AddModule { wallet: Address, module: Address },
    AddGuardian { wallet: Address, guardian: Address },
    ConfirmGuardianAddition { wallet: Address, guardian: Address },
    CancelGuardianAddition { wallet: Address, guardian: Address },
    RevokeGuardian { wallet: Address, guardian: Address },
    ConfirmGuardianRevocation { wallet: Address, guardian: Address },
    CancelGuardianRevocation { wallet: Address, guardian: Address },
}

impl GuardianManagerCall {
    pub fn wallet(&self) -> Address {
        use GuardianManagerCall::*;
        match self {
            AddModule { wallet, .. }
            | AddGuardian { wallet, .. }
            | ConfirmGuardianAddition { wallet, .. }
            | CancelGuardianAddition { wallet, .. }
            | RevokeGuardian { wallet, .. }
            | ConfirmGuardianRevocation { wallet, .. }
            | CancelGuardianRevocation { wallet, .. } => *wallet,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WalletError> {
        encode_call(self)
    }
}

/// A requested guardian change waiting out its security period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub requested_at: DateTime<Utc>,
    pub confirm_after: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingChange {
    /// Still blocks a new request of the same kind.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_confirmable(&self, now: DateTime<Utc>) -> bool {
        self.confirm_after <= now && now < self.expires_at
    }
}

/// Which way a pending change goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Addition,
    Revocation,
}

impl Change {
    fn namespace(self) -> &'static str {
        match self {
            Change::Addition => ADDITION,
            Change::Revocation => REVOCATION,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Change::Addition => "guardian addition",
            Change::Revocation => "guardian revocation",
        }
    }
}

pub struct GuardianManager {
    address: Address,
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl GuardianManager {
    /// A guardian manager deployed under `label`.
    pub fn new(label: &str) -> Self {
        Self {
            address: Address::derive("module", label),
        }
    }

    /// # Errors
    ///
    /// [`WalletError::InvalidCallData`] if the stored record is corrupt.
    pub fn pending_addition(
        &self,
        ledger: &Ledger,
        wallet: &Address,
        guardian: &Address,
    ) -> Result<Option<PendingChange>, WalletError> {
        self.pending(ledger, Change::Addition, wallet, guardian)
    }

    pub fn pending_revocation(
        &self,
        ledger: &Ledger,
        wallet: &Address,
        guardian: &Address,
    ) -> Result<Option<PendingChange>, WalletError> {
        self.pending(ledger, Change::Revocation, wallet, guardian)
    }

    pub fn guardian_count(&self, ledger: &Ledger, wallet: &Address) -> usize {
        ledger.guardian_count(wallet)
    }

    pub fn is_guardian(&self, ledger: &Ledger, wallet: &Address, candidate: &Address) -> bool {
        ledger.is_guardian(wallet, candidate)
    }

    pub fn guardians(&self, ledger: &Ledger, wallet: &Address) -> Vec<Address> {
        ledger.guardians(wallet).to_vec()
    }

    fn pending(
        &self,
        ledger: &Ledger,
        change: Change,
        wallet: &Address,
        guardian: &Address,
    ) -> Result<Option<PendingChange>, WalletError> {
        let key = storage_key(change.namespace(), wallet, Some(guardian));
        ledger.load(&self.address, &key)
    }

    fn add_guardian(
        &self,
        ctx: &mut CallContext<'_>,
        wallet: Address,
        guardian: Address,
    ) -> Result<(), WalletError> {
        self.check_change(ctx, &wallet)?;
        if guardian.is_zero() {
            return Err(WalletError::InvalidGuardian("guardian cannot be null"));
        }
        if guardian == ctx.ledger().owner(&wallet)? {
            return Err(WalletError::InvalidGuardian("owner cannot be a guardian"));
        }
        if ctx.ledger().is_guardian(&wallet, &guardian) {
            return Err(WalletError::InvalidGuardian("target is already a guardian"));
        }

        if ctx.ledger().guardian_count(&wallet) == 0 {
            ctx.add_guardian(wallet, guardian)?;
            info!(wallet = %wallet, guardian = %guardian, "first guardian added");
            ctx.emit(WalletEvent::GuardianAdded { wallet, guardian });
            return Ok(());
        }

        let pending = self.request(ctx, Change::Addition, wallet, guardian)?;
        ctx.emit(WalletEvent::GuardianAdditionRequested {
            wallet,
            guardian,
            execute_after: pending.confirm_after,
        });
        Ok(())
    }

    fn confirm_guardian_addition(
        &self,
        ctx: &mut CallContext<'_>,
        wallet: Address,
        guardian: Address,
    ) -> Result<(), WalletError> {
        self.check_change(ctx, &wallet)?;
        self.take_confirmable(ctx, Change::Addition, wallet, guardian)?;
        // The owner may have changed while the request waited.
        if guardian == ctx.ledger().owner(&wallet)? {
            return Err(WalletError::InvalidGuardian("owner cannot be a guardian"));
        }
        // The guardian may already be back in through the first-guardian path.
        if ctx.add_guardian(wallet, guardian)? {
            info!(wallet = %wallet, guardian = %guardian, "guardian addition confirmed");
            ctx.emit(WalletEvent::GuardianAdded { wallet, guardian });
        }
        Ok(())
    }

    fn cancel_guardian_addition(
        &self,
        ctx: &mut CallContext<'_>,
        wallet: Address,
        guardian: Address,
    ) -> Result<(), WalletError> {
        self.check_change(ctx, &wallet)?;
        self.take_pending(ctx, Change::Addition, wallet, guardian)?;
        ctx.emit(WalletEvent::GuardianAdditionCancelled { wallet, guardian });
        Ok(())
    }

    fn revoke_guardian(
        &self,
        ctx: &mut CallContext<'_>,
        wallet: Address,
        guardian: Address,
    ) -> Result<(), WalletError> {
        self.check_change(ctx, &wallet)?;
        if !ctx.ledger().is_guardian(&wallet, &guardian) {
            return Err(WalletError::InvalidGuardian("target is not a guardian"));
        }
        let pending = self.request(ctx, Change::Revocation, wallet, guardian)?;
        ctx.emit(WalletEvent::GuardianRevocationRequested {
            wallet,
            guardian,
            execute_after: pending.confirm_after,
        });
        Ok(())
    }

    fn confirm_guardian_revocation(
        &self,
        ctx: &mut CallContext<'_>,
        wallet: Address,
        guardian: Address,
    ) -> Result<(), WalletError> {
        self.check_change(ctx, &wallet)?;
        self.take_confirmable(ctx, Change::Revocation, wallet, guardian)?;
        if ctx.revoke_guardian(wallet, guardian)? {
            info!(wallet = %wallet, guardian = %guardian, "guardian revocation confirmed");
            ctx.emit(WalletEvent::GuardianRevoked { wallet, guardian });
        }
        Ok(())
    }

    fn cancel_guardian_revocation(
        &self,
        ctx: &mut CallContext<'_>,
        wallet: Address,
        guardian: Address,
    ) -> Result<(), WalletError> {
        self.check_change(ctx, &wallet)?;
        self.take_pending(ctx, Change::Revocation, wallet, guardian)?;
        ctx.emit(WalletEvent::GuardianRevocationCancelled { wallet, guardian });
        Ok(())
    }

    fn check_change(&self, ctx: &CallContext<'_>, wallet: &Address) -> Result<(), WalletError> {
        ctx.require_owner(wallet)?;
        ctx.require_unlocked(wallet)
    }

    /// Record a new pending change, refusing while an earlier one is live.
    fn request(
        &self,
        ctx: &mut CallContext<'_>,
        change: Change,
        wallet: Address,
        guardian: Address,
    ) -> Result<PendingChange, WalletError> {
        let now = ctx.now();
        let key = storage_key(change.namespace(), &wallet, Some(&guardian));
        if let Some(existing) = ctx.load::<PendingChange>(&key)? {
            if existing.is_live(now) {
                return Err(WalletError::ChangePending(change.label()));
            }
        }
        let confirm_after = now + ctx.config().security_period();
        let pending = PendingChange {
            requested_at: now,
            confirm_after,
            expires_at: confirm_after + ctx.config().security_window(),
        };
        ctx.store(key, &pending)?;
        info!(
            wallet = %wallet,
            guardian = %guardian,
            change = change.label(),
            confirm_after = %pending.confirm_after,
            "guardian change requested"
        );
        Ok(pending)
    }

    fn take_pending(
        &self,
        ctx: &mut CallContext<'_>,
        change: Change,
        wallet: Address,
        guardian: Address,
    ) -> Result<PendingChange, WalletError> {
        let key = storage_key(change.namespace(), &wallet, Some(&guardian));
        let pending = ctx
            .load::<PendingChange>(&key)?
            .ok_or(WalletError::NoPendingChange(change.label()))?;
        ctx.erase(&key);
        Ok(pending)
    }

    fn take_confirmable(
        &self,
        ctx: &mut CallContext<'_>,
        change: Change,
        wallet: Address,
        guardian: Address,
    ) -> Result<(), WalletError> {
        let now = ctx.now();
        let pending = self.take_pending(ctx, change, wallet, guardian)?;
        if now < pending.confirm_after {
            return Err(WalletError::TooEarlyToConfirm(change.label()));
        }
        if !pending.is_confirmable(now) {
            return Err(WalletError::TooLateToConfirm(change.label()));
        }
        Ok(())
    }
}

impl Module for GuardianManager {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &str {
        "GuardianManager"
    }

    fn target_wallet(&self, data: &[u8]) -> Result<Address, WalletError> {
        Ok(decode_call::<GuardianManagerCall>(data)?.wallet())
    }

    fn required_signatures(
        &self,
        _ledger: &Ledger,
        _wallet: &Address,
        data: &[u8],
    ) -> Result<CallPolicy, WalletError> {
        decode_call::<GuardianManagerCall>(data)?;
        Ok(CallPolicy::owner_unlocked())
    }

    fn execute(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), WalletError> {
        use GuardianManagerCall::*;
        match decode_call(data)? {
            AddModule { wallet, module } => add_module(ctx, wallet, module),
            AddGuardian { wallet, guardian } => self.add_guardian(ctx, wallet, guardian),
            ConfirmGuardianAddition { wallet, guardian } => {
                self.confirm_guardian_addition(ctx, wallet, guardian)
            }
            CancelGuardianAddition { wallet, guardian } => {
                self.cancel_guardian_addition(ctx, wallet, guardian)
            }
            RevokeGuardian { wallet, guardian } => self.revoke_guardian(ctx, wallet, guardian),
            ConfirmGuardianRevocation { wallet, guardian } => {
                self.confirm_guardian_revocation(ctx, wallet, guardian)
            }
            CancelGuardianRevocation { wallet, guardian } => {
                self.cancel_guardian_revocation(ctx, wallet, guardian)
            }
        }
    }
}
