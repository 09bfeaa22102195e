//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (ed25519-dalek) for every signature an owner, guardian or
//!   registrar produces.
//! - **BLAKE3** for Warden-native digests.
//! - **SHA-256** for compatibility.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, domain_hash, sha256};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
pub use signatures::{sign, verify, verify_signer, SignatureError};
