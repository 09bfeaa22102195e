//! # Hashing Utilities
//!
//! - **BLAKE3** is the default for Warden-native digests: relay sign hashes,
//!   address derivation, storage keys.
//! - **SHA-256** stays around for systems that expect it.
//!
//! Anything that gets signed or used as an identity is hashed under a
//! domain-separation context (see [`domain_hash`]), so a digest computed for
//! one purpose can never be replayed as another.

use sha2::{Digest, Sha256};

/// SHA-256 of the input as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// BLAKE3 of the input.
///
/// ```
/// use warden_protocol::crypto::blake3_hash;
///
/// assert_eq!(blake3_hash(b"warden").len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 in key-derivation mode over several parts.
///
/// `context` must be a hard-coded, globally unique string. Each part is
/// length-prefixed so `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn domain_hash(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(&(part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
