//! # Addresses
//!
//! A 32-byte identity shared by every actor Warden knows about: accounts
//! (owners, guardians, relayer submitters), wallets, modules and external
//! contracts.
//!
//! - An **account** address is its Ed25519 public key.
//! - Everything else gets a **derived** address: BLAKE3 in key-derivation
//!   mode over a kind and a label, so `derive("module", "lock-manager")` is
//!   the same on every machine and cannot collide with another kind.
//!
//! Addresses are totally ordered by their bytes. The relayer relies on that
//! ordering to demand strictly increasing signer lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::crypto::hash::domain_hash;
use crate::crypto::keys::{KeyError, PublicKey};

const ADDRESS_DERIVATION_CONTEXT: &str = "warden 2026-01 address derivation v1";

/// Errors when parsing an address from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("address is not valid hex")]
    InvalidHex,
}

/// A 32-byte identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    /// The null identity. Never a valid owner, guardian or module.
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic address for a non-account entity.
    pub fn derive(kind: &str, label: &str) -> Self {
        Self(domain_hash(
            ADDRESS_DERIVATION_CONTEXT,
            &[kind.as_bytes(), label.as_bytes()],
        ))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Interpret the address as an account public key.
    ///
    /// # Errors
    ///
    /// [`KeyError::InvalidPublicKey`] when the bytes are not a valid
    /// Ed25519 point.
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        PublicKey::try_from_slice(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<&PublicKey> for Address {
    fn from(pk: &PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(AddressError::InvalidLength(s.len()));
        }
        let bytes = hex::decode(s).map_err(|_| AddressError::InvalidHex)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{}..)", self.short())
    }
}
