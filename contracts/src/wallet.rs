//! # Wallet State
//!
//! A wallet is deliberately dumb: an owner, a set of authorised modules, and
//! an optional lock. Every mutation is gated on the caller being one of the
//! wallet's own modules. Policy (who may lock, how recovery works, what
//! signatures a call needs) lives in the modules, never here.
//!
//! The lock is a single slot. Whichever module sets it owns it until it
//! expires: only that module may clear it early, anyone may clear it after
//! `release_after`. Expiry is lazy; an expired lock simply stops counting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use warden_protocol::Address;

use crate::error::WalletError;
use crate::registry::ModuleRegistry;

/// An active or expired lock on a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletLock {
    pub release_after: DateTime<Utc>,
    pub locked_by: Address,
}

impl WalletLock {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.release_after
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletState {
    owner: Address,
    modules: BTreeSet<Address>,
    lock: Option<WalletLock>,
}

impl WalletState {
    /// Build a freshly initialised wallet.
    ///
    /// Duplicate entries in `modules` collapse to one.
    ///
    /// # Errors
    ///
    /// - [`WalletError::NullOwner`] for a null owner.
    /// - [`WalletError::ZeroModules`] for an empty module list.
    /// - [`WalletError::ModulesNotRegistered`] if any module is unregistered.
    pub fn init(
        owner: Address,
        modules: &[Address],
        registry: &ModuleRegistry,
    ) -> Result<Self, WalletError> {
        if owner.is_zero() {
            return Err(WalletError::NullOwner);
        }
        if modules.is_empty() {
            return Err(WalletError::ZeroModules);
        }
        if !registry.are_registered(modules) {
            return Err(WalletError::ModulesNotRegistered);
        }
        Ok(Self {
            owner,
            modules: modules.iter().copied().collect(),
            lock: None,
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn modules(&self) -> impl Iterator<Item = &Address> {
        self.modules.iter()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn is_authorised(&self, module: &Address) -> bool {
        self.modules.contains(module)
    }

    pub fn require_module(&self, caller: &Address) -> Result<(), WalletError> {
        if self.is_authorised(caller) {
            Ok(())
        } else {
            Err(WalletError::NotAuthorisedModule)
        }
    }

    /// Add (`value = true`) or remove (`value = false`) a module.
    ///
    /// Returns whether the module set changed; re-adding a present module or
    /// removing an absent one is a no-op.
    ///
    /// # Errors
    ///
    /// - [`WalletError::NotAuthorisedModule`] if `caller` is not authorised.
    /// - [`WalletError::ModuleNotRegistered`] when adding an unregistered module.
    /// - [`WalletError::ZeroModules`] when removing the last module.
    pub fn authorise(
        &mut self,
        caller: &Address,
        module: Address,
        value: bool,
        registry: &ModuleRegistry,
    ) -> Result<bool, WalletError> {
        self.require_module(caller)?;
        if value {
            if self.modules.contains(&module) {
                return Ok(false);
            }
            if !registry.is_registered(&module) {
                return Err(WalletError::ModuleNotRegistered);
            }
            self.modules.insert(module);
        } else {
            if !self.modules.contains(&module) {
                return Ok(false);
            }
            if self.modules.len() == 1 {
                return Err(WalletError::ZeroModules);
            }
            self.modules.remove(&module);
        }
        Ok(true)
    }

    pub fn set_owner(&mut self, caller: &Address, new_owner: Address) -> Result<(), WalletError> {
        self.require_module(caller)?;
        if new_owner.is_zero() {
            return Err(WalletError::NullOwner);
        }
        self.owner = new_owner;
        Ok(())
    }

    /// Record a lock held by `caller` until `release_after`. An expired lock,
    /// or one `caller` already holds, is replaced.
    ///
    /// # Errors
    ///
    /// [`WalletError::LockedByOtherModule`] if the lock is still active and
    /// held by a different module.
    pub fn set_lock(
        &mut self,
        caller: &Address,
        release_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), WalletError> {
        self.require_module(caller)?;
        if let Some(lock) = self.lock {
            if lock.is_active(now) && lock.locked_by != *caller {
                return Err(WalletError::LockedByOtherModule);
            }
        }
        self.lock = Some(WalletLock {
            release_after,
            locked_by: *caller,
        });
        Ok(())
    }

    /// Clear the lock.
    ///
    /// # Errors
    ///
    /// [`WalletError::LockedByOtherModule`] if the lock is still active and
    /// held by a different module.
    pub fn clear_lock(&mut self, caller: &Address, now: DateTime<Utc>) -> Result<(), WalletError> {
        self.require_module(caller)?;
        if let Some(lock) = self.lock {
            if lock.is_active(now) && lock.locked_by != *caller {
                return Err(WalletError::LockedByOtherModule);
            }
        }
        self.lock = None;
        Ok(())
    }

    /// The lock, if one is active at `now`.
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<WalletLock> {
        self.lock.filter(|l| l.is_active(now))
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.active_lock(now).is_some()
    }

    /// Release time as Unix seconds, or `0` when unlocked.
    pub fn lock_release_time(&self, now: DateTime<Utc>) -> u64 {
        self.active_lock(now)
            .map(|l| u64::try_from(l.release_after.timestamp()).unwrap_or(0))
            .unwrap_or(0)
    }
}
