//! Hash with Keccak-256, sign with recoverable secp256k1, and derive account addresses.
//!
//! The primitives in this crate follow the conventions of Ethereum-style execution
//! environments: digests are Keccak-256 (not SHA3-256), signatures are 65-byte recoverable
//! secp256k1 ECDSA signatures (`r || s || v`), and accounts are identified by the last
//! 20 bytes of the Keccak-256 digest of an uncompressed public key.
//!
//! # Status
//!
//! `dnp-cryptography` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use thiserror::Error;

pub mod keccak256;
pub use keccak256::{hash, Digest, Keccak256};
pub mod secp256k1;
pub use secp256k1::{Address, PrivateKey, PublicKey, Signature};

/// Errors that can occur when interacting with cryptographic primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid digest length")]
    InvalidDigestLength,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid private key length")]
    InvalidPrivateKeyLength,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid public key length")]
    InvalidPublicKeyLength,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid signature length")]
    InvalidSignatureLength,
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("invalid address length")]
    InvalidAddressLength,
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("signing failed")]
    SigningFailed,
    #[error("public key recovery failed")]
    RecoveryFailed,
}

/// Interface that crates in this workspace rely on for hashing.
///
/// This trait is required to implement the `Clone` trait because it is often
/// part of a struct that is cloned. In practice, implementations do not actually
/// clone the hasher state but users should not rely on this behavior and call `reset`
/// after cloning.
pub trait Hasher: Clone + Send + Sync + 'static {
    /// Digest generated by the hasher.
    type Digest: AsRef<[u8]> + Copy + Eq;

    /// Create a new hasher.
    fn new() -> Self;

    /// Append message to previously recorded data.
    fn update(&mut self, message: &[u8]);

    /// Hash all recorded data and reset the hasher
    /// to the initial state.
    fn finalize(&mut self) -> Self::Digest;

    /// Reset the hasher without generating a hash.
    ///
    /// This function does not need to be called after `finalize`.
    fn reset(&mut self);

    /// Return result of hashing nothing.
    fn empty() -> Self::Digest {
        Self::new().finalize()
    }
}
