//! Recoverable secp256k1 signatures and the account addresses derived from them.
//!
//! This implementation signs 32-byte Keccak-256 prehashes, generates deterministic signatures as
//! specified in [RFC 6979](https://datatracker.ietf.org/doc/html/rfc6979), and only ever emits
//! signatures normalized according to [BIP 62](https://github.com/bitcoin/bips/blob/master/bip-0062.mediawiki#low-s-values-in-signatures).
//! Signatures carry a trailing recovery id (`r || s || v`, `v ∈ {0, 1}`) so that the signer's
//! [PublicKey] (and therefore its [Address]) can be recovered from the signature alone.
//!
//! # Example
//! ```rust
//! use dnp_cryptography::secp256k1::PrivateKey;
//! use rand::rngs::OsRng;
//!
//! // Generate a new private key
//! let signer = PrivateKey::from_rng(&mut OsRng);
//!
//! // Sign a message (hashed with Keccak-256 internally)
//! let msg = b"hello, world!";
//! let signature = signer.sign(msg).unwrap();
//!
//! // Recover the signer
//! let recovered = signature.recover(msg).unwrap();
//! assert_eq!(recovered, signer.public_key());
//! assert_eq!(recovered.address(), signer.address());
//! ```

mod address;
pub use address::Address;
mod scheme;
pub use scheme::{PrivateKey, PublicKey, Signature};
