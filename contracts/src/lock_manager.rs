//! # Lock Manager
//!
//! Lets guardians freeze a wallet (for example when the owner key is lost or
//! stolen) for `lock_period`. The lock expires on its own: there is no
//! unlock transaction at the deadline, `is_locked` simply starts returning
//! `false`.
//!
//! Guardians may lift their own lock early. They cannot lift a lock another
//! module placed; a recovery lock in particular only goes away through the
//! recovery flow.

use serde::{Deserialize, Serialize};
use tracing::info;
use warden_protocol::Address;

use crate::error::WalletError;
use crate::events::WalletEvent;
use crate::ledger::{CallContext, Ledger};
use crate::module::{add_module, decode_call, encode_call, CallPolicy, LockPolicy, Module, SignerPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockManagerCall {
    AddModule { wallet: Address, module: Address },
    Lock { wallet: Address },
    Unlock { wallet: Address },
}

impl LockManagerCall {
    pub fn wallet(&self) -> Address {
        match self {
            LockManagerCall::AddModule { wallet, .. }
            | LockManagerCall::Lock { wallet }
            | LockManagerCall::Unlock { wallet } => *wallet,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WalletError> {
        encode_call(self)
    }
}

pub struct LockManager {
    address: Address,
}

impl LockManager {
    pub fn new(label: &str) -> Self {
        Self {
            address: Address::derive("module", label),
        }
    }

    pub fn is_locked(&self, ledger: &Ledger, wallet: &Address) -> bool {
        ledger.is_locked(wallet)
    }

    /// Release time of the active lock in Unix seconds, `0` if unlocked.
    pub fn get_lock(&self, ledger: &Ledger, wallet: &Address) -> u64 {
        ledger.lock_release_time(wallet)
    }

    /// The module holding the active lock, if any.
    pub fn locked_by(&self, ledger: &Ledger, wallet: &Address) -> Option<Address> {
        ledger.lock(wallet).map(|l| l.locked_by)
    }

    fn lock(&self, ctx: &mut CallContext<'_>, wallet: Address) -> Result<(), WalletError> {
        ctx.require_guardian(&wallet)?;
        if ctx.ledger().is_locked(&wallet) {
            return Err(WalletError::AlreadyLocked);
        }
        let release_after = ctx.now() + ctx.config().lock_period();
        ctx.set_lock(wallet, release_after)?;
        info!(wallet = %wallet, release_after = %release_after, "wallet locked");
        ctx.emit(WalletEvent::Locked {
            wallet,
            release_after,
        });
        Ok(())
    }

    fn unlock(&self, ctx: &mut CallContext<'_>, wallet: Address) -> Result<(), WalletError> {
        // Lock state first: an unlock attempt on the wrong lock reports why,
        // whoever sent it.
        let lock = ctx.ledger().lock(&wallet).ok_or(WalletError::NotLocked)?;
        if lock.locked_by != self.address {
            return Err(WalletError::LockedByOtherModule);
        }
        ctx.require_guardian(&wallet)?;
        ctx.clear_lock(wallet)?;
        info!(wallet = %wallet, "wallet unlocked");
        ctx.emit(WalletEvent::Unlocked { wallet });
        Ok(())
    }
}

impl Module for LockManager {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &str {
        "LockManager"
    }

    fn target_wallet(&self, data: &[u8]) -> Result<Address, WalletError> {
        Ok(decode_call::<LockManagerCall>(data)?.wallet())
    }

    fn required_signatures(
        &self,
        _ledger: &Ledger,
        _wallet: &Address,
        data: &[u8],
    ) -> Result<CallPolicy, WalletError> {
        Ok(match decode_call::<LockManagerCall>(data)? {
            LockManagerCall::AddModule { .. } => CallPolicy::owner_unlocked(),
            LockManagerCall::Lock { .. } => CallPolicy::new(
                SignerPolicy::GuardiansOnly(1),
                LockPolicy::DisabledWhileLocked,
            ),
            LockManagerCall::Unlock { .. } => CallPolicy::new(
                SignerPolicy::GuardiansOnly(1),
                LockPolicy::AllowedWhileLocked,
            ),
        })
    }

    fn execute(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), WalletError> {
        match decode_call(data)? {
            LockManagerCall::AddModule { wallet, module } => add_module(ctx, wallet, module),
            LockManagerCall::Lock { wallet } => self.lock(ctx, wallet),
            LockManagerCall::Unlock { wallet } => self.unlock(ctx, wallet),
        }
    }
}
