//! Types exchanged by the node protocol.

use crate::Error;
use bytes::{Buf, BufMut};
use commonware_codec::{
    DecodeExt, Encode, EncodeSize, Error as CodecError, RangeCfg, Read, Write,
};
use dnp_cryptography::{Address, Signature};
use std::fmt::Display;

/// Maximum length (in bytes) of the identifier carried by [NodeValidations].
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum number of attestations carried by [NodeValidations].
pub const MAX_VALIDATIONS: usize = 1_024;

/// Formats an enode URL: `enode://<identifier>@<network_address>:<port>`.
pub fn enode_url(identifier: &str, network_address: &str, port: &str) -> String {
    format!("enode://{identifier}@{network_address}:{port}")
}

/// A node record decoded from contract storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    /// Position of the record in the contract's record mapping.
    pub index: u64,

    /// Node identifier (hex-encoded public key, at most 128 characters).
    pub identifier: String,

    /// Owning account.
    pub address: Address,

    /// Network address (typically an IPv4 literal).
    pub network_address: String,

    /// Port (decimal string).
    pub port: String,
}

impl NodeRecord {
    /// Returns the enode URL of the record.
    pub fn enode_url(&self) -> String {
        enode_url(&self.identifier, &self.network_address, &self.port)
    }
}

impl Display for NodeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.enode_url(), self.address)
    }
}

/// Attestations collected for a single node.
///
/// `id` is the attested node's identifier and `validations` are signatures by peers over the
/// Keccak-256 digest of that identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeValidations {
    pub id: Vec<u8>,
    pub validations: Vec<Signature>,
}

impl NodeValidations {
    /// Create an empty set of attestations for `id`.
    pub fn new(id: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            validations: Vec::new(),
        }
    }

    /// Add an attestation.
    pub fn push(&mut self, signature: Signature) {
        self.validations.push(signature);
    }

    /// Returns the number of attestations.
    pub fn len(&self) -> usize {
        self.validations.len()
    }

    /// Returns true if there are no attestations.
    pub fn is_empty(&self) -> bool {
        self.validations.is_empty()
    }

    fn check(&self) -> Result<(), Error> {
        if self.id.len() > MAX_ID_LENGTH {
            return Err(Error::Serialization("identifier too long"));
        }
        if self.validations.len() > MAX_VALIDATIONS {
            return Err(Error::Serialization("too many validations"));
        }
        Ok(())
    }

    /// Serialize the attestations into a transaction payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        self.check()?;
        Ok(self.encode().to_vec())
    }

    /// Deserialize attestations from a transaction payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode(bytes)?)
    }
}

impl Write for NodeValidations {
    fn write(&self, buf: &mut impl BufMut) {
        self.id.write(buf);
        self.validations.write(buf);
    }
}

impl EncodeSize for NodeValidations {
    fn encode_size(&self) -> usize {
        self.id.encode_size() + self.validations.encode_size()
    }
}

impl Read for NodeValidations {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let id = Vec::<u8>::read_cfg(buf, &(RangeCfg::from(0..=MAX_ID_LENGTH), ()))?;
        let validations =
            Vec::<Signature>::read_cfg(buf, &(RangeCfg::from(0..=MAX_VALIDATIONS), ()))?;
        Ok(Self { id, validations })
    }
}
