//! Mock collaborators for testing.

use crate::{
    layout::{self, Word},
    CandidacyChecker, ChainClient, Error as ProtocolError, NodeRecord, PeerAdmin, PeerDirectory,
    SignedTransaction, StateReader, SyncStatus,
};
use dnp_cryptography::{keccak256, Address, Digest};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Mutex,
};
use thiserror::Error;

/// Errors that can be returned by mock collaborators.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unavailable")]
    Unavailable,
    #[error("rejected")]
    Rejected,
}

/// In-memory contract storage. Unset slots read as zero.
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    slots: HashMap<(Address, Word), Word>,
}

impl MemoryState {
    /// Store `value` at `slot` of `contract`.
    pub fn insert(&mut self, contract: &Address, slot: Word, value: Word) {
        self.slots.insert((*contract, slot), value);
    }

    /// Store `value` at `slot` of `contract` using the compiler's string encoding.
    ///
    /// Strings shorter than 32 bytes are stored in place with `2 * len` in the last byte. Longer
    /// strings store `2 * len + 1` at `slot` and their content at `keccak256(slot)` onward.
    pub fn insert_string(&mut self, contract: &Address, slot: Word, value: &str) {
        let bytes = value.as_bytes();
        if bytes.len() < 32 {
            let mut raw = [0u8; 32];
            raw[..bytes.len()].copy_from_slice(bytes);
            raw[31] = (bytes.len() * 2) as u8;
            self.insert(contract, slot, Word::new(raw));
            return;
        }
        self.insert(contract, slot, Word::from_u64(bytes.len() as u64 * 2 + 1));
        let start = Word::from(keccak256::hash(slot.as_ref()));
        for (i, chunk) in bytes.chunks(32).enumerate() {
            let mut raw = [0u8; 32];
            raw[..chunk.len()].copy_from_slice(chunk);
            self.insert(contract, start.offset(i as u64), Word::new(raw));
        }
    }

    /// Set the number of registered records.
    pub fn insert_record_count(&mut self, contract: &Address, count: u64) {
        self.insert(
            contract,
            Word::from_u64(layout::RECORD_COUNT_SLOT),
            Word::from_u64(count),
        );
    }

    fn insert_at(&mut self, contract: &Address, base: Word, record: &NodeRecord) {
        let owner = Word::from_address(&record.address);
        self.insert(contract, base.offset(layout::KEY_OFFSET), owner);
        self.insert(contract, base.offset(layout::OWNER_OFFSET), owner);
        self.insert_string(
            contract,
            base.offset(layout::IDENTIFIER_OFFSET),
            &record.identifier,
        );
        self.insert_string(
            contract,
            base.offset(layout::NETWORK_ADDRESS_OFFSET),
            &record.network_address,
        );
        self.insert_string(contract, base.offset(layout::PORT_OFFSET), &record.port);
    }

    /// Store `record` in the index-keyed mapping at `record.index`. The record is keyed by its
    /// owner. The record count is not updated.
    pub fn insert_record(&mut self, contract: &Address, record: &NodeRecord) {
        self.insert_at(contract, layout::record_base_slot(record.index), record);
    }

    /// Store `record` in the owner-keyed mapping at `record.address`.
    pub fn insert_owner_record(&mut self, contract: &Address, record: &NodeRecord) {
        self.insert_at(contract, layout::owner_base_slot(&record.address), record);
    }
}

impl StateReader for MemoryState {
    type Error = Error;

    fn storage_at(&self, contract: &Address, slot: &Word) -> Result<Word, Self::Error> {
        Ok(self
            .slots
            .get(&(*contract, *slot))
            .copied()
            .unwrap_or(Word::ZERO))
    }
}

/// Contract storage that fails every read.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingState;

impl StateReader for FailingState {
    type Error = Error;

    fn storage_at(&self, _: &Address, _: &Word) -> Result<Word, Self::Error> {
        Err(Error::Unavailable)
    }
}

/// A chain client that records every broadcast transaction.
#[derive(Debug)]
pub struct Client {
    nonce: u64,
    network_id: u64,
    failure: Option<Error>,
    broadcasts: Mutex<Vec<SignedTransaction>>,
}

impl Client {
    /// Create a new [Client] reporting `nonce` and `network_id`.
    pub fn new(nonce: u64, network_id: u64) -> Self {
        Self {
            nonce,
            network_id,
            failure: None,
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    /// Create a [Client] that fails every call with `error`.
    pub fn failing(error: Error) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(0, 0)
        }
    }

    /// Returns every transaction broadcast so far.
    pub fn broadcasts(&self) -> Vec<SignedTransaction> {
        self.broadcasts.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), Error> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl ChainClient for Client {
    type Error = Error;

    fn pending_nonce(&self, _: &Address) -> Result<u64, Self::Error> {
        self.check()?;
        Ok(self.nonce)
    }

    fn network_id(&self) -> Result<u64, Self::Error> {
        self.check()?;
        Ok(self.network_id)
    }

    fn broadcast(&self, transaction: &SignedTransaction) -> Result<Digest, Self::Error> {
        self.check()?;
        self.broadcasts.lock().unwrap().push(transaction.clone());
        Ok(transaction.hash())
    }
}

/// A static set of connected peers (identifier to remote IP).
#[derive(Clone, Debug, Default)]
pub struct Peers {
    peers: BTreeMap<String, String>,
}

impl Peers {
    /// Add a connected peer.
    pub fn connect(&mut self, id: impl Into<String>, ip: impl Into<String>) {
        self.peers.insert(id.into(), ip.into());
    }
}

impl PeerDirectory for Peers {
    fn peers(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    fn ip_of(&self, id: &str) -> Option<String> {
        self.peers.get(id).cloned()
    }
}

/// An admin API that records every requested peer.
#[derive(Debug, Default)]
pub struct Admin {
    failure: Option<Error>,
    added: Mutex<Vec<String>>,
}

impl Admin {
    /// Create an [Admin] that fails every request with `error`.
    pub fn failing(error: Error) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    /// Returns every URL requested so far.
    pub fn added(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }
}

impl PeerAdmin for Admin {
    type Error = Error;

    fn add_peer(&self, url: &str) -> Result<bool, Self::Error> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.added.lock().unwrap().push(url.to_string());
        Ok(true)
    }
}

/// A fixed sync status. `None` fails every query.
#[derive(Clone, Copy, Debug)]
pub struct SyncState(pub Option<bool>);

impl SyncStatus for SyncState {
    type Error = Error;

    fn syncing(&self) -> Result<bool, Self::Error> {
        self.0.ok_or(Error::Unavailable)
    }
}

/// A [CandidacyChecker] that accepts a fixed set of senders.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    allowed: BTreeSet<Address>,
}

impl AllowList {
    /// Create an [AllowList] accepting `allowed`.
    pub fn new(allowed: impl IntoIterator<Item = Address>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl CandidacyChecker for AllowList {
    fn is_candidate(&self, sender: &Address) -> Result<bool, ProtocolError> {
        Ok(self.allowed.contains(sender))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_short_string() {
        let contract = Address::new([0xaa; 20]);
        let mut state = MemoryState::default();
        state.insert_string(&contract, Word::from_u64(5), "30303");
        let word = state.storage_at(&contract, &Word::from_u64(5)).unwrap();
        assert_eq!(&word.as_ref()[..5], b"30303");
        assert_eq!(word.as_ref()[31], 10);
    }

    #[test]
    fn test_insert_record_count() {
        let contract = Address::new([0xaa; 20]);
        let mut state = MemoryState::default();
        state.insert_record_count(&contract, 7);
        assert_eq!(
            state.storage_at(&contract, &Word::from_u64(2)).unwrap(),
            Word::from_u64(7)
        );
        assert_eq!(layout::read_record_count(&state, &contract).unwrap(), 7);
    }

    #[test]
    fn test_insert_long_string() {
        let contract = Address::new([0xaa; 20]);
        let slot = Word::from_u64(5);
        let value = "x".repeat(40);
        let mut state = MemoryState::default();
        state.insert_string(&contract, slot, &value);
        assert_eq!(
            state.storage_at(&contract, &slot).unwrap(),
            Word::from_u64(81)
        );
        let start = Word::from(keccak256::hash(slot.as_ref()));
        assert_eq!(
            state.storage_at(&contract, &start).unwrap(),
            Word::new([b'x'; 32])
        );
        let tail = state.storage_at(&contract, &start.offset(1)).unwrap();
        assert_eq!(tail.printable(), "x".repeat(8));
    }
}
