//! # Warden Wallet Authorization Core
//!
//! A modular smart-wallet security layer. Wallets hold funds and nothing
//! else; every rule about who may do what lives in pluggable modules that a
//! wallet authorises:
//!
//! - **Module Registry**: the registrar-curated allow-list of deployable
//!   modules and upgraders.
//! - **Wallet**: owner, authorised-module set and a single lock slot,
//!   mutable only by its own modules.
//! - **Guardian Manager**: adds and revokes guardians behind a
//!   security period and confirmation window.
//! - **Lock Manager**: guardians freeze a wallet; the lock expires on its own.
//! - **Recovery Manager**: a guardian majority replaces a lost owner key.
//! - **Relayer Module**: meta-transactions signed by owner and/or guardians,
//!   nonce-ordered and refunded to the submitter.
//! - **Upgrader**: an atomic module swap that never leaves a wallet without
//!   a module.
//!
//! Everything runs on a [`ledger::Ledger`]: the execution substrate that
//! owns all state, runs every entry point in a rollback frame, and refuses
//! reentrant calls into a wallet that is mid-call.
//!
//! ## Design Principles
//!
//! 1. Balance and gas arithmetic is checked; overflow is an error.
//! 2. State transitions are explicit: pending records and enums, not flags.
//! 3. Every privileged mutation names the module performing it, and the
//!    wallet refuses modules it has not authorised.
//! 4. A failed call leaves no trace: state and events roll back together.

pub mod error;
pub mod events;
pub mod guardian_manager;
pub mod guardian_store;
pub mod ledger;
pub mod lock_manager;
pub mod module;
pub mod recovery_manager;
pub mod registry;
pub mod relayer;
pub mod upgrader;
pub mod wallet;

pub use error::{ErrorKind, WalletError};
pub use events::WalletEvent;
pub use guardian_manager::{GuardianManager, GuardianManagerCall};
pub use ledger::{Asset, CallContext, ExternalContract, ExternalContext, Ledger, SharedLedger};
pub use lock_manager::{LockManager, LockManagerCall};
pub use module::{CallPolicy, Caller, LockPolicy, Module, SignerPolicy, SignerSet};
pub use recovery_manager::{RecoveryManager, RecoveryManagerCall, RecoveryState};
pub use registry::{ModuleKind, ModuleRegistry};
pub use relayer::{RefundInfo, RelayedCall, RelayerCall, RelayerModule, SignerSignature};
pub use upgrader::Upgrader;
