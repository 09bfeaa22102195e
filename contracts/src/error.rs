//! # Wallet Errors
//!
//! One error type for the whole authorization core. Every variant's
//! `Display` text is a stable revert reason: clients match on it, so the
//! strings never change once published.
//!
//! [`WalletError::kind`] buckets variants into the coarse [`ErrorKind`]
//! taxonomy for callers that only care about the class of failure.

use thiserror::Error;

/// Coarse failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the required role.
    Unauthorized,
    /// Signatures are insufficient or incorrect for the resolved policy.
    PolicyNotSatisfied,
    /// Relay nonce mismatch.
    InvalidNonce,
    /// Operation disabled while the wallet is locked, or lock state wrong.
    WalletLocked,
    /// A delayed change was confirmed too early, too late, or not at all.
    PendingWindowViolation,
    /// Module registration or module-set constraint violated.
    RegistryViolation,
    /// Malformed input (bad owner, bad guardian, bad call data).
    InvalidArgument,
    /// Substrate failure: missing wallet, funds, reentrancy, overflow.
    Execution,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::PolicyNotSatisfied => write!(f, "PolicyNotSatisfied"),
            ErrorKind::InvalidNonce => write!(f, "InvalidNonce"),
            ErrorKind::WalletLocked => write!(f, "WalletLocked"),
            ErrorKind::PendingWindowViolation => write!(f, "PendingWindowViolation"),
            ErrorKind::RegistryViolation => write!(f, "RegistryViolation"),
            ErrorKind::InvalidArgument => write!(f, "InvalidArgument"),
            ErrorKind::Execution => write!(f, "Execution"),
        }
    }
}

/// Every way a wallet operation can revert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    // ----- Unauthorized -----
    /// Caller is not the wallet owner.
    #[error("must be wallet owner")]
    NotOwner,

    /// Caller is not a guardian of the wallet.
    #[error("must be a guardian of the wallet")]
    NotGuardian,

    /// Caller is not a module authorised on the wallet.
    #[error("must be an authorised module")]
    NotAuthorisedModule,

    /// Registry mutation by someone other than the registry owner.
    #[error("must be the registry owner")]
    NotRegistryOwner,

    /// Operation only reachable through the relayer.
    #[error("must be called through the relayer")]
    RelayOnly,

    /// Relayed or direct call to a module the wallet has not authorised.
    #[error("module not authorised")]
    ModuleNotAuthorised,

    /// The Upgrader has no callable operations.
    #[error("upgrader cannot be called")]
    NotCallable,

    // ----- PolicyNotSatisfied -----
    /// Signatures unsorted, duplicated, unverifiable, or from a non-party.
    #[error("Invalid signatures")]
    InvalidSignatures,

    /// Verified signers do not meet the call's signer policy.
    #[error("wrong number of signatures")]
    PolicyNotSatisfied,

    /// The relayed data targets a different wallet.
    #[error("target of the call is not the relayed wallet")]
    TargetWalletMismatch,

    // ----- InvalidNonce -----
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce {
        /// Nonce the relayer was waiting for.
        expected: u64,
        /// Nonce the call carried.
        got: u64,
    },

    // ----- WalletLocked -----
    /// Operation disabled while the wallet is locked.
    #[error("wallet locked")]
    WalletLocked,

    /// Lock requested on a wallet that already has an active lock.
    #[error("wallet must be unlocked")]
    AlreadyLocked,

    /// Unlock requested on a wallet without an active lock.
    #[error("wallet must be locked")]
    NotLocked,

    /// Unlock by a module that does not hold the lock.
    #[error("cannot unlock a wallet that was locked by another module")]
    LockedByOtherModule,

    // ----- PendingWindowViolation -----
    #[error("no pending {0} for target")]
    NoPendingChange(&'static str),

    #[error("{0} of target is already pending")]
    ChangePending(&'static str),

    #[error("too early to confirm {0}")]
    TooEarlyToConfirm(&'static str),

    #[error("too late to confirm {0}")]
    TooLateToConfirm(&'static str),

    #[error("there must be an ongoing recovery")]
    NoOngoingRecovery,

    #[error("there cannot be an ongoing recovery")]
    RecoveryOngoing,

    #[error("the recovery period is not over")]
    RecoveryPeriodNotOver,

    // ----- RegistryViolation -----
    /// Batch registration check failed.
    #[error("Not all modules are registered")]
    ModulesNotRegistered,

    #[error("module is not registered")]
    ModuleNotRegistered,

    #[error("module is already registered")]
    AlreadyRegistered,

    #[error("module is already added")]
    ModuleAlreadyAdded,

    /// Removing the wallet's last module.
    #[error("cannot assign with less than 1 module")]
    ZeroModules,

    #[error("invalid module name: {0}")]
    InvalidModuleName(&'static str),

    // ----- InvalidArgument -----
    #[error("owner cannot be null")]
    NullOwner,

    #[error("wallet already initialised")]
    AlreadyInitialised,

    #[error("invalid guardian: {0}")]
    InvalidGuardian(&'static str),

    #[error("invalid new owner: {0}")]
    InvalidNewOwner(&'static str),

    #[error("invalid call data: {0}")]
    InvalidCallData(String),

    #[error("too many signatures: {count} (max {max})")]
    TooManySignatures {
        /// Signatures supplied.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    // ----- Execution -----
    #[error("unknown wallet")]
    UnknownWallet,

    #[error("no module deployed at address")]
    UnknownModule,

    #[error("forbidden destination")]
    ForbiddenDestination,

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the transfer needed.
        required: u64,
        /// Balance actually held.
        available: u64,
    },

    #[error("reentrant call")]
    Reentrancy,

    #[error("arithmetic overflow")]
    Overflow,

    /// A value could not be serialized for a call or for module storage.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// An external contract reverted.
    #[error("call reverted: {0}")]
    CallReverted(String),
}

impl WalletError {
    /// The taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        use WalletError::*;
        match self {
            NotOwner | NotGuardian | NotAuthorisedModule | NotRegistryOwner | RelayOnly
            | ModuleNotAuthorised | NotCallable => ErrorKind::Unauthorized,
            InvalidSignatures | PolicyNotSatisfied | TargetWalletMismatch => {
                ErrorKind::PolicyNotSatisfied
            }
            InvalidNonce { .. } => ErrorKind::InvalidNonce,
            WalletLocked | AlreadyLocked | NotLocked | LockedByOtherModule => {
                ErrorKind::WalletLocked
            }
            NoPendingChange(_) | ChangePending(_) | TooEarlyToConfirm(_) | TooLateToConfirm(_)
            | NoOngoingRecovery | RecoveryOngoing | RecoveryPeriodNotOver => {
                ErrorKind::PendingWindowViolation
            }
            ModulesNotRegistered | ModuleNotRegistered | AlreadyRegistered
            | ModuleAlreadyAdded | ZeroModules | InvalidModuleName(_) => {
                ErrorKind::RegistryViolation
            }
            NullOwner | AlreadyInitialised | InvalidGuardian(_) | InvalidNewOwner(_)
            | InvalidCallData(_) | TooManySignatures { .. } => ErrorKind::InvalidArgument,
            UnknownWallet | UnknownModule | ForbiddenDestination | InsufficientFunds { .. }
            | Reentrancy | Overflow | Encoding(_) | CallReverted(_) => ErrorKind::Execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(WalletError::NotLocked.to_string(), "wallet must be locked");
        assert_eq!(
            WalletError::LockedByOtherModule.to_string(),
            "cannot unlock a wallet that was locked by another module"
        );
        assert_eq!(
            WalletError::ModulesNotRegistered.to_string(),
            "Not all modules are registered"
        );
        assert_eq!(
            WalletError::ZeroModules.to_string(),
            "cannot assign with less than 1 module"
        );
        assert_eq!(WalletError::WalletLocked.to_string(), "wallet locked");
        assert_eq!(WalletError::InvalidSignatures.to_string(), "Invalid signatures");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            WalletError::InvalidNonce { expected: 1, got: 0 }.kind(),
            ErrorKind::InvalidNonce
        );
        assert_eq!(WalletError::NotGuardian.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            WalletError::TooLateToConfirm("guardian addition").kind(),
            ErrorKind::PendingWindowViolation
        );
        assert_eq!(WalletError::ZeroModules.kind(), ErrorKind::RegistryViolation);
        assert_eq!(WalletError::LockedByOtherModule.kind(), ErrorKind::WalletLocked);
        assert_eq!(ErrorKind::PolicyNotSatisfied.to_string(), "PolicyNotSatisfied");
    }

    #[test]
    fn parameterised_reasons() {
        assert_eq!(
            WalletError::TooEarlyToConfirm("guardian revocation").to_string(),
            "too early to confirm guardian revocation"
        );
        assert_eq!(
            WalletError::ChangePending("addition").to_string(),
            "addition of target is already pending"
        );
    }
}
