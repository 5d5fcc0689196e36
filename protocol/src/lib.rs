//! Decode node records from contract storage and attest to node activity with signed transactions.
//!
//! # Overview
//!
//! Peers register identity and connectivity metadata (node identifier, network address, port,
//! owning account) in the storage of a node-protocol contract. Other peers vouch for a node's
//! activity by signing its identifier and submitting the collected attestations to the same
//! contract in a transaction.
//!
//! This crate is the synchronous core of that protocol:
//!
//! - [layout] re-derives the contract compiler's storage slots and decodes node records from a
//!   [StateReader].
//! - [attestation] signs node identifiers and recovers/verifies attesting peers.
//! - [validator] decides whether a transaction may invoke the node-protocol contract.
//! - [transaction] encodes collected attestations and signs the transaction that carries them.
//! - [bridge] wraps the host node's peer set, admin API, and sync status.
//!
//! State readers and chain clients are borrowed for the duration of a single call and never
//! retained. Callers are responsible for supplying a [StateReader] that reflects
//! a single, consistent block.
//!
//! # Status
//!
//! `dnp-protocol` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use dnp_cryptography::{Address, Digest};
use std::collections::BTreeSet;
use thiserror::Error;

pub mod attestation;
pub mod bridge;
pub mod layout;
pub use layout::Word;
pub mod mocks;
pub mod transaction;
pub use transaction::{SignedTransaction, Transaction};
pub mod types;
pub use types::{NodeRecord, NodeValidations};
pub mod validator;
pub use validator::{is_valid_protocol_transaction, RegisteredNodes, Validator};

/// Boxed error returned by a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when interacting with the node protocol.
#[derive(Error, Debug)]
pub enum Error {
    #[error("storage read failed: {0}")]
    StorageRead(#[source] BoxError),
    #[error("chain client failed: {0}")]
    Client(#[source] BoxError),
    #[error("peer admin failed: {0}")]
    PeerAdmin(#[source] BoxError),
    #[error("signing failed: {0}")]
    Signing(#[source] dnp_cryptography::Error),
    #[error("recovery failed: {0}")]
    Recovery(#[source] dnp_cryptography::Error),
    #[error("serialization failed: {0}")]
    Serialization(&'static str),
    #[error("codec error: {0}")]
    Codec(#[from] commonware_codec::Error),
    #[error("rlp error: {0}")]
    Rlp(#[from] rlp::DecoderError),
    #[error("invalid transaction: {0}")]
    InvalidTransaction(&'static str),
}

/// Point-in-time read access to contract storage.
///
/// Implementations must serve every read of a single operation from the same block's state.
pub trait StateReader {
    /// Error returned when a slot cannot be read.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the 32-byte word stored at `slot` of `contract`. Unset slots read as zero.
    fn storage_at(&self, contract: &Address, slot: &Word) -> Result<Word, Self::Error>;
}

/// Access to the chain for nonce assignment, chain identification, and broadcast.
pub trait ChainClient {
    /// Error returned by the client.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the next nonce for `address`, including pending transactions.
    fn pending_nonce(&self, address: &Address) -> Result<u64, Self::Error>;

    /// Returns the network id (used as the EIP-155 chain id).
    fn network_id(&self) -> Result<u64, Self::Error>;

    /// Broadcast a signed transaction, returning its hash.
    fn broadcast(&self, transaction: &SignedTransaction) -> Result<Digest, Self::Error>;
}

/// The set of currently connected peers.
pub trait PeerDirectory {
    /// Returns the identifiers of all connected peers.
    fn peers(&self) -> Vec<String>;

    /// Returns the remote IP of a connected peer.
    fn ip_of(&self, id: &str) -> Option<String>;

    /// Returns the number of connected peers.
    fn len(&self) -> usize {
        self.peers().len()
    }

    /// Returns true if no peers are connected.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Administrative control over the host's peer connections.
pub trait PeerAdmin {
    /// Error returned by the admin API.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Request a connection to the peer at `url` (an enode URL).
    fn add_peer(&self, url: &str) -> Result<bool, Self::Error>;
}

/// Reports whether the host node is still catching up with the chain.
pub trait SyncStatus {
    /// Error returned when the status cannot be determined.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns true while the host is syncing.
    fn syncing(&self) -> Result<bool, Self::Error>;
}

/// Decides whether a sender may submit node-protocol transactions.
///
/// `Ok(false)` is a normal denial. `Err(_)` means no decision could be made.
pub trait CandidacyChecker {
    /// Returns true if `sender` may submit node-protocol transactions.
    fn is_candidate(&self, sender: &Address) -> Result<bool, Error>;
}

/// Gas limit used for validation transactions when none is configured.
pub const DEFAULT_GAS_LIMIT: u64 = 8_000_000;

/// Address validation transactions are sent to when none is configured.
pub const DEFAULT_VALIDATION_ADDRESS: Address = Address::new([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0,
]);

/// Upper bound on the number of records scanned in a single operation.
pub const DEFAULT_MAX_RECORDS: u64 = 4_096;

/// A tier of nodes tracked by the protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeType {
    /// Human-readable name of the tier.
    pub name: String,

    /// Recipient of node-protocol transactions for this tier.
    pub tx_address: Address,

    /// Contract holding this tier's node records.
    pub contract_address: Address,
}

/// Configuration for the node protocol.
#[derive(Clone, Debug)]
pub struct Config {
    /// Block height at which the protocol activates. Transactions below this height are
    /// never valid protocol transactions.
    pub activation_height: u64,

    /// Node tiers (and their contracts) recognized by the protocol.
    pub node_types: Vec<NodeType>,

    /// Recipient of validation transactions.
    pub validation_address: Address,

    /// Gas limit of validation transactions.
    pub gas_limit: u64,

    /// Gas price of validation transactions.
    pub gas_price: u64,

    /// Maximum number of records scanned when enumerating a contract.
    pub max_records: u64,
}

impl Config {
    /// Returns the set of addresses that node-protocol transactions may be sent to.
    pub fn registered_contracts(&self) -> BTreeSet<Address> {
        self.node_types.iter().map(|t| t.tx_address).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activation_height: 0,
            node_types: Vec::new(),
            validation_address: DEFAULT_VALIDATION_ADDRESS,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: 0,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}
