// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Warden Protocol: Shared Primitives
//!
//! Everything the wallet authorization core needs that is not itself wallet
//! logic:
//!
//! - **address**: 32-byte identities for accounts, wallets and modules.
//! - **crypto**: Ed25519 keys and signatures, BLAKE3/SHA-256 hashing.
//! - **config**: protocol constants and the validated [`config::CoreConfig`].
//! - **clock**: the time source every security period is measured against.
//! - **logging**: `tracing` subscriber setup.
//!
//! The authorization core itself lives in the `warden-contracts` crate.

pub mod address;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod logging;

pub use address::Address;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
