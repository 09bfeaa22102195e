//! # Module Registry
//!
//! The allow-list of modules a wallet may authorise. Wallets consult it at
//! the moment a module is added (at creation, through `AddModule`, or by an
//! Upgrader); deregistering a module later does not evict it from wallets
//! that already trust it.
//!
//! Only the registry owner can mutate the list. Upgraders are registered
//! with [`ModuleKind::Upgrader`] and count as registered modules too, since a
//! wallet has to authorise an upgrader before it can run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use warden_protocol::config::MAX_MODULE_NAME_LENGTH;
use warden_protocol::Address;

use crate::error::WalletError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    /// An ordinary module exposing operations.
    Module,
    /// A one-shot module-set migration.
    Upgrader,
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::Module => write!(f, "Module"),
            ModuleKind::Upgrader => write!(f, "Upgrader"),
        }
    }
}

/// What the registry knows about a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub kind: ModuleKind,
    pub registered_at: DateTime<Utc>,
}

/// Registered modules and upgraders, keyed by address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRegistry {
    owner: Address,
    entries: BTreeMap<Address, RegistryEntry>,
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl ModuleRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            entries: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Register a module or upgrader under a name.
    ///
    /// # Errors
    ///
    /// - [`WalletError::NotRegistryOwner`] if `caller` is not the owner.
    /// - [`WalletError::InvalidModuleName`] for an empty or over-long name.
    /// - [`WalletError::AlreadyRegistered`] if the address is already listed.
    pub fn register(
        &mut self,
        caller: Address,
        module: Address,
        name: &str,
        kind: ModuleKind,
        now: DateTime<Utc>,
    ) -> Result<(), WalletError> {
        self.require_owner(caller)?;
        if name.is_empty() {
            return Err(WalletError::InvalidModuleName("name cannot be empty"));
        }
        if name.len() > MAX_MODULE_NAME_LENGTH {
            return Err(WalletError::InvalidModuleName("name longer than 32 bytes"));
        }
        if self.entries.contains_key(&module) {
            return Err(WalletError::AlreadyRegistered);
        }
        self.entries.insert(
            module,
            RegistryEntry {
                name: name.to_string(),
                kind,
                registered_at: now,
            },
        );
        Ok(())
    }

    /// Remove a module from the allow-list and return its entry.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotRegistryOwner`] or [`WalletError::ModuleNotRegistered`].
    pub fn deregister(
        &mut self,
        caller: Address,
        module: Address,
    ) -> Result<RegistryEntry, WalletError> {
        self.require_owner(caller)?;
        self.entries
            .remove(&module)
            .ok_or(WalletError::ModuleNotRegistered)
    }

    /// Hand the registry to a new owner.
    pub fn change_owner(&mut self, caller: Address, new_owner: Address) -> Result<(), WalletError> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(WalletError::NullOwner);
        }
        self.owner = new_owner;
        Ok(())
    }

    pub fn is_registered(&self, module: &Address) -> bool {
        self.entries.contains_key(module)
    }

    /// True when every address is registered. Vacuously true for an empty
    /// slice.
    pub fn are_registered(&self, modules: &[Address]) -> bool {
        modules.iter().all(|m| self.is_registered(m))
    }

    pub fn is_upgrader(&self, module: &Address) -> bool {
        self.entries
            .get(module)
            .is_some_and(|e| e.kind == ModuleKind::Upgrader)
    }

    /// Name, kind and registration time of a registered module.
    pub fn module_info(&self, module: &Address) -> Option<&RegistryEntry> {
        self.entries.get(module)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require_owner(&self, caller: Address) -> Result<(), WalletError> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(WalletError::NotRegistryOwner)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
