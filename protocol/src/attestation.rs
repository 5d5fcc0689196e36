//! Sign node identifiers and recover the peers that attested to them.
//!
//! An attestation is a recoverable signature over the Keccak-256 digest of a node identifier.
//! The attesting peer is identified by the public key (and address) recovered from it.

use crate::{Error, NodeValidations};
use dnp_cryptography::{keccak256, Address, Digest, PrivateKey, PublicKey, Signature};
use tracing::debug;

/// Returns the Keccak-256 digest of `data`.
pub fn hash(data: &[u8]) -> Digest {
    keccak256::hash(data)
}

/// Sign `message` (hashed with Keccak-256) with `key`.
pub fn sign(key: &PrivateKey, message: &[u8]) -> Result<Signature, Error> {
    key.sign(message).map_err(Error::Signing)
}

/// Recover the public key and address that produced `signature` over `message`.
pub fn recover_signer(message: &[u8], signature: &Signature) -> Result<(PublicKey, Address), Error> {
    let public_key = signature.recover(message).map_err(Error::Recovery)?;
    let address = public_key.address();
    Ok((public_key, address))
}

/// Returns true if `signature` over `message` was produced by `expected`.
///
/// Signatures that cannot be recovered are rejected.
pub fn verify(message: &[u8], signature: &Signature, expected: &Address) -> bool {
    match recover_signer(message, signature) {
        Ok((public_key, address)) => {
            debug!(node_id = %public_key.node_id(), %address, %expected, "recovered signer");
            address == *expected
        }
        Err(err) => {
            debug!(?err, %expected, "unable to recover signer");
            false
        }
    }
}

/// Recover the address of every peer that attested to `validations.id`.
pub fn recover_signers(validations: &NodeValidations) -> Result<Vec<Address>, Error> {
    validations
        .validations
        .iter()
        .map(|signature| recover_signer(&validations.id, signature).map(|(_, address)| address))
        .collect()
}
