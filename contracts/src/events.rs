//! # Events
//!
//! Observable record of every state change. The ledger appends events in
//! emission order; events emitted inside a frame that reverts are discarded
//! with the rest of that frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_protocol::Address;

use crate::ledger::Asset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletEvent {
    // ----- Registry -----
    ModuleRegistered {
        module: Address,
        name: String,
        upgrader: bool,
    },
    ModuleDeregistered {
        module: Address,
    },

    // ----- Wallet -----
    WalletCreated {
        wallet: Address,
        owner: Address,
    },
    AuthorisedModule {
        wallet: Address,
        module: Address,
        value: bool,
    },
    OwnerChanged {
        wallet: Address,
        new_owner: Address,
    },
    Invoked {
        wallet: Address,
        target: Address,
        value: u64,
        data: Vec<u8>,
    },

    // ----- Relayer -----
    TransactionExecuted {
        wallet: Address,
        success: bool,
        sign_hash: [u8; 32],
    },
    Refund {
        wallet: Address,
        refund_address: Address,
        asset: Asset,
        amount: u64,
    },

    // ----- Guardians -----
    GuardianAdditionRequested {
        wallet: Address,
        guardian: Address,
        execute_after: DateTime<Utc>,
    },
    GuardianAdded {
        wallet: Address,
        guardian: Address,
    },
    GuardianAdditionCancelled {
        wallet: Address,
        guardian: Address,
    },
    GuardianRevocationRequested {
        wallet: Address,
        guardian: Address,
        execute_after: DateTime<Utc>,
    },
    GuardianRevoked {
        wallet: Address,
        guardian: Address,
    },
    GuardianRevocationCancelled {
        wallet: Address,
        guardian: Address,
    },

    // ----- Locks -----
    Locked {
        wallet: Address,
        release_after: DateTime<Utc>,
    },
    Unlocked {
        wallet: Address,
    },

    // ----- Recovery -----
    RecoveryExecuted {
        wallet: Address,
        recovery: Address,
        execute_after: DateTime<Utc>,
    },
    RecoveryFinalized {
        wallet: Address,
        recovery: Address,
    },
    RecoveryCanceled {
        wallet: Address,
        recovery: Address,
    },
    OwnershipTransferred {
        wallet: Address,
        new_owner: Address,
    },
}

impl WalletEvent {
    /// The wallet the event concerns, if any.
    pub fn wallet(&self) -> Option<Address> {
        use WalletEvent::*;
        match self {
            ModuleRegistered { .. } | ModuleDeregistered { .. } => None,
            WalletCreated { wallet, .. }
            | AuthorisedModule { wallet, .. }
            | OwnerChanged { wallet, .. }
            | Invoked { wallet, .. }
            | TransactionExecuted { wallet, .. }
            | Refund { wallet, .. }
            | GuardianAdditionRequested { wallet, .. }
            | GuardianAdded { wallet, .. }
            | GuardianAdditionCancelled { wallet, .. }
            | GuardianRevocationRequested { wallet, .. }
            | GuardianRevoked { wallet, .. }
            | GuardianRevocationCancelled { wallet, .. }
            | Locked { wallet, .. }
            | Unlocked { wallet }
            | RecoveryExecuted { wallet, .. }
            | RecoveryFinalized { wallet, .. }
            | RecoveryCanceled { wallet, .. }
            | OwnershipTransferred { wallet, .. } => Some(*wallet),
        }
    }

    /// Event name, as used in log lines.
    pub fn name(&self) -> &'static str {
        use WalletEvent::*;
        match self {
            ModuleRegistered { .. } => "ModuleRegistered",
            ModuleDeregistered { .. } => "ModuleDeregistered",
            WalletCreated { .. } => "WalletCreated",
            AuthorisedModule { .. } => "AuthorisedModule",
            OwnerChanged { .. } => "OwnerChanged",
            Invoked { .. } => "Invoked",
            TransactionExecuted { .. } => "TransactionExecuted",
            Refund { .. } => "Refund",
            GuardianAdditionRequested { .. } => "GuardianAdditionRequested",
            GuardianAdded { .. } => "GuardianAdded",
            GuardianAdditionCancelled { .. } => "GuardianAdditionCancelled",
            GuardianRevocationRequested { .. } => "GuardianRevocationRequested",
            GuardianRevoked { .. } => "GuardianRevoked",
            GuardianRevocationCancelled { .. } => "GuardianRevocationCancelled",
            Locked { .. } => "Locked",
            Unlocked { .. } => "Unlocked",
            RecoveryExecuted { .. } => "RecoveryExecuted",
            RecoveryFinalized { .. } => "RecoveryFinalized",
            RecoveryCanceled { .. } => "RecoveryCanceled",
            OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }
}
