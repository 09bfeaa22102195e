//! # Guardian Store
//!
//! Per-wallet ordered guardian sets, shared by every module that cares about
//! guardians. The store checks capabilities itself: a mutation is only
//! accepted from a module the wallet has authorised. No module keeps its own
//! copy of a guardian list.
//!
//! A guardian is either an account (an Ed25519 key) or another wallet. A
//! wallet guardian acts through its own owner; resolution stops there, so a
//! wallet guarded by a wallet guarded by a wallet does not chain.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use warden_protocol::Address;

use crate::error::WalletError;
use crate::wallet::WalletState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardianStore {
    sets: HashMap<Address, Vec<Address>>,
}

impl GuardianStore {
    /// Append `guardian` to the wallet's set on behalf of module `caller`.
    ///
    /// Returns `false` if the guardian was already present.
    pub fn add_guardian(
        &mut self,
        wallet: &Address,
        wallet_state: &WalletState,
        caller: &Address,
        guardian: Address,
    ) -> Result<bool, WalletError> {
        wallet_state.require_module(caller)?;
        let set = self.sets.entry(*wallet).or_default();
        if set.contains(&guardian) {
            return Ok(false);
        }
        set.push(guardian);
        Ok(true)
    }

    /// Remove `guardian` from the wallet's set on behalf of module `caller`.
    ///
    /// Returns `false` if the guardian was not present.
    pub fn revoke_guardian(
        &mut self,
        wallet: &Address,
        wallet_state: &WalletState,
        caller: &Address,
        guardian: &Address,
    ) -> Result<bool, WalletError> {
        wallet_state.require_module(caller)?;
        let Some(set) = self.sets.get_mut(wallet) else {
            return Ok(false);
        };
        let before = set.len();
        set.retain(|g| g != guardian);
        Ok(set.len() != before)
    }

    pub fn is_guardian(&self, wallet: &Address, candidate: &Address) -> bool {
        self.guardians(wallet).contains(candidate)
    }

    pub fn guardian_count(&self, wallet: &Address) -> usize {
        self.guardians(wallet).len()
    }

    /// Guardians in the order they were added.
    pub fn guardians(&self, wallet: &Address) -> &[Address] {
        self.sets.get(wallet).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Map an acting account to the guardian it speaks for.
    ///
    /// `signer` speaks for itself if it is a guardian, or for a wallet
    /// guardian whose owner it is. `owner_of` looks up a wallet's owner.
    pub fn resolve_signer(
        &self,
        wallet: &Address,
        signer: &Address,
        owner_of: impl Fn(&Address) -> Option<Address>,
    ) -> Option<Address> {
        let guardians = self.guardians(wallet);
        if guardians.contains(signer) {
            return Some(*signer);
        }
        guardians
            .iter()
            .find(|g| owner_of(g).as_ref() == Some(signer))
            .copied()
    }
}
