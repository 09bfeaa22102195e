//! # Upgrader
//!
//! A one-shot module swap. An upgrader is deployed with a fixed pair of
//! module lists and registered as an upgrader. The owner authorises it on a
//! wallet with `AddModule` on any core module, and its authorisation hook
//! then:
//!
//! 1. checks every module in `to_add` is registered,
//! 2. authorises each module in `to_add`,
//! 3. deauthorises each module in `to_remove`,
//! 4. deauthorises itself.
//!
//! All of this runs inside the frame of the `AddModule` call. If any step
//! fails, for example because the removals would leave the wallet with no
//! module, the wallet ends up exactly as it was before.
//!
//! The upgrader has no callable operations of its own.

use tracing::info;
use warden_protocol::Address;

use crate::error::WalletError;
use crate::ledger::{CallContext, Ledger};
use crate::module::{CallPolicy, Module};

pub struct Upgrader {
    address: Address,
    to_remove: Vec<Address>,
    to_add: Vec<Address>,
}

impl Upgrader {
    /// An upgrader deployed under `label`. Duplicate entries in either list
    /// collapse to their first occurrence.
    pub fn new(label: &str, to_remove: &[Address], to_add: &[Address]) -> Self {
        Self {
            address: Address::derive("upgrader", label),
            to_remove: dedup(to_remove),
            to_add: dedup(to_add),
        }
    }

    pub fn to_remove(&self) -> &[Address] {
        &self.to_remove
    }

    pub fn to_add(&self) -> &[Address] {
        &self.to_add
    }
}

fn dedup(modules: &[Address]) -> Vec<Address> {
    let mut out: Vec<Address> = Vec::with_capacity(modules.len());
    for module in modules {
        if !out.contains(module) {
            out.push(*module);
        }
    }
    out
}

impl Module for Upgrader {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &str {
        "Upgrader"
    }

    fn init(&self, ctx: &mut CallContext<'_>, wallet: Address) -> Result<(), WalletError> {
        if !ctx.ledger().registry().are_registered(&self.to_add) {
            return Err(WalletError::ModulesNotRegistered);
        }
        for module in &self.to_add {
            ctx.authorise_module(wallet, *module, true)?;
        }
        for module in self.to_remove.iter().filter(|m| **m != self.address) {
            ctx.authorise_module(wallet, *module, false)?;
        }
        ctx.authorise_module(wallet, self.address, false)?;
        info!(
            wallet = %wallet,
            upgrader = %self.address,
            added = self.to_add.len(),
            removed = self.to_remove.len(),
            "wallet upgraded"
        );
        Ok(())
    }

    fn target_wallet(&self, _data: &[u8]) -> Result<Address, WalletError> {
        Err(WalletError::NotCallable)
    }

    fn required_signatures(
        &self,
        _ledger: &Ledger,
        _wallet: &Address,
        _data: &[u8],
    ) -> Result<CallPolicy, WalletError> {
        Err(WalletError::NotCallable)
    }

    fn execute(&self, _ctx: &mut CallContext<'_>, _data: &[u8]) -> Result<(), WalletError> {
        Err(WalletError::NotCallable)
    }
}
