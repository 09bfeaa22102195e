//! # Digital Signatures
//!
//! Free-function entry points for signing and verification. The relayer
//! checks every signature on a meta-transaction through [`verify_signer`],
//! which folds "the claimed signer is not even a valid key" and "the
//! signature is wrong" into the same answer.

use thiserror::Error;

use super::keys::{Keypair, PublicKey, Signature};
use crate::address::Address;

/// Errors during signature checks.
///
/// Intentionally vague: callers learn *that* verification failed, not why.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Sign a message with a keypair.
pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

/// Verify a signature against a public key.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.verify(message, signature)
}

/// Verify that `signer` (an account address) produced `signature` over
/// `message`.
///
/// # Errors
///
/// [`SignatureError::InvalidPublicKey`] if the address is not an Ed25519
/// key, [`SignatureError::VerificationFailed`] if the signature does not
/// check out.
pub fn verify_signer(
    signer: &Address,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    let public_key = signer
        .public_key()
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    if verify(&public_key, message, signature) {
        Ok(())
    } else {
        Err(SignatureError::VerificationFailed)
    }
}
