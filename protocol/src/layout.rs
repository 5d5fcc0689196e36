//! Decode node records from the storage of the node-protocol contract.
//!
//! Contract storage is a flat map from 32-byte slots to 32-byte words. Structured values are
//! located by re-deriving the slots the contract compiler assigned to them:
//!
//! ```text
//! mapping(uint256 => Record) records;   // declared at slot 1 (RECORDS_SLOT)
//! uint256 count;                        // declared at slot 2 (RECORD_COUNT_SLOT)
//!
//! base(i)         = keccak256(leftPad32(i) ++ leftPad32(1))
//!
//! base(i) + 0     key     (address, right-aligned)
//! base(i) + 1     owner   (address, right-aligned)
//! base(i) + 2     identifier length; content at keccak256(base(i) + 2) + 0..=3
//! base(i) + 3     network address (short string)
//! base(i) + 4     port (short string)
//! ```
//!
//! Records are also reachable by owner through `mapping(address => Record)` declared at slot 0
//! (OWNERS_SLOT), in which case `base = keccak256(leftPad32(owner) ++ leftPad32(0))`.
//!
//! # Lossy Decoding
//!
//! Strings are reconstructed from raw words by keeping only printable ASCII (`0x20..=0x7e`) and
//! dropping everything else (padding, length markers, non-ASCII). Decoding therefore never fails
//! on content, only when the underlying [StateReader] fails. Two limits follow from this rule:
//!
//! - Identifiers are read from exactly [IDENTIFIER_WORDS] words, so anything beyond
//!   [MAX_IDENTIFIER_LENGTH] characters is silently truncated.
//! - Short strings of 16 or more bytes carry a printable length marker in their last byte, which
//!   is kept. Network addresses and ports are expected to be shorter than that.
//!
//! # Example
//!
//! ```rust
//! use dnp_protocol::{layout, mocks::MemoryState, NodeRecord};
//! use dnp_cryptography::Address;
//!
//! let contract = Address::new([0xaa; 20]);
//! let record = NodeRecord {
//!     index: 0,
//!     identifier: "ab".repeat(64),
//!     address: Address::new([0x11; 20]),
//!     network_address: "203.0.113.5".into(),
//!     port: "30303".into(),
//! };
//!
//! // Populate storage the way the contract would
//! let mut state = MemoryState::default();
//! state.insert_record(&contract, &record);
//!
//! // Decode it
//! let (url, owner) = layout::decode_record(&state, &contract, 0).unwrap();
//! assert_eq!(url, record.enode_url());
//! assert_eq!(owner, record.address);
//! ```

use crate::{Error, NodeRecord, StateReader};
use commonware_utils::hex;
use dnp_cryptography::{keccak256, Address, Digest, Hasher, Keccak256};
use std::fmt::{Debug, Display};
use tracing::{debug, trace, warn};

const WORD_LENGTH: usize = 32;
const ADDRESS_OFFSET: usize = WORD_LENGTH - 20;

/// Declared slot of the owner-keyed record mapping.
pub const OWNERS_SLOT: u64 = 0;

/// Declared slot of the index-keyed record mapping.
pub const RECORDS_SLOT: u64 = 1;

/// Well-known slot holding the number of registered records.
pub const RECORD_COUNT_SLOT: u64 = 2;

/// Offset of the record key from a record's base slot.
pub const KEY_OFFSET: u64 = 0;

/// Offset of the owner address from a record's base slot.
pub const OWNER_OFFSET: u64 = 1;

/// Offset of the identifier (length) slot from a record's base slot.
pub const IDENTIFIER_OFFSET: u64 = 2;

/// Offset of the network address from a record's base slot.
pub const NETWORK_ADDRESS_OFFSET: u64 = 3;

/// Offset of the port from a record's base slot.
pub const PORT_OFFSET: u64 = 4;

/// Number of words read when reconstructing an identifier.
pub const IDENTIFIER_WORDS: u64 = 4;

/// Maximum identifier length (in characters) that can be reconstructed.
pub const MAX_IDENTIFIER_LENGTH: usize = IDENTIFIER_WORDS as usize * WORD_LENGTH;

/// A 32-byte big-endian storage word. Used both as a slot (key) and as a stored value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Word([u8; WORD_LENGTH]);

impl Word {
    /// The all-zero word.
    pub const ZERO: Self = Self([0u8; WORD_LENGTH]);

    /// Create a [Word] from raw bytes.
    pub const fn new(raw: [u8; WORD_LENGTH]) -> Self {
        Self(raw)
    }

    /// Left-pad an integer to 32 bytes.
    pub fn from_u64(value: u64) -> Self {
        let mut raw = [0u8; WORD_LENGTH];
        raw[WORD_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
        Self(raw)
    }

    /// Left-pad an address to 32 bytes.
    pub fn from_address(address: &Address) -> Self {
        let mut raw = [0u8; WORD_LENGTH];
        raw[ADDRESS_OFFSET..].copy_from_slice(address.as_ref());
        Self(raw)
    }

    /// Returns `self + n`, wrapping modulo 2^256.
    pub fn offset(&self, n: u64) -> Self {
        let mut raw = self.0;
        let mut carry = n;
        for byte in raw.iter_mut().rev() {
            if carry == 0 {
                break;
            }
            let sum = *byte as u64 + (carry & 0xff);
            *byte = sum as u8;
            carry = (carry >> 8) + (sum >> 8);
        }
        Self(raw)
    }

    /// Interpret the word as an unsigned integer, if it fits in a `u64`.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[..WORD_LENGTH - 8].iter().any(|b| *b != 0) {
            return None;
        }
        let mut value = [0u8; 8];
        value.copy_from_slice(&self.0[WORD_LENGTH - 8..]);
        Some(u64::from_be_bytes(value))
    }

    /// Interpret the low 20 bytes of the word as an [Address]. The high 12 bytes are ignored.
    pub fn address(&self) -> Address {
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&self.0[ADDRESS_OFFSET..]);
        Address::new(raw)
    }

    /// Returns the printable ASCII bytes of the word (in order) as a string.
    pub fn printable(&self) -> String {
        self.0
            .iter()
            .filter(|b| (0x20..0x7f).contains(*b))
            .map(|b| *b as char)
            .collect()
    }

    /// Returns true if every byte of the word is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; WORD_LENGTH]
    }

    /// Returns the raw bytes of the word.
    pub fn to_bytes(&self) -> [u8; WORD_LENGTH] {
        self.0
    }
}

impl From<Digest> for Word {
    fn from(digest: Digest) -> Self {
        Self(digest.to_bytes())
    }
}

impl From<[u8; WORD_LENGTH]> for Word {
    fn from(raw: [u8; WORD_LENGTH]) -> Self {
        Self(raw)
    }
}

impl TryFrom<&[u8]> for Word {
    type Error = dnp_cryptography::Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let raw: [u8; WORD_LENGTH] = value
            .try_into()
            .map_err(|_| dnp_cryptography::Error::InvalidDigestLength)?;
        Ok(Self(raw))
    }
}

impl AsRef<[u8]> for Word {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex(&self.0))
    }
}

impl Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex(&self.0))
    }
}

/// Slot of the value stored under `key` in a mapping declared at slot `variable`:
/// `keccak256(key ++ leftPad32(variable))`.
pub fn mapping_slot(key: &Word, variable: u64) -> Word {
    let mut hasher = Keccak256::new();
    hasher.update(key.as_ref());
    hasher.update(Word::from_u64(variable).as_ref());
    Word::from(hasher.finalize())
}

/// Base slot of the record at `index`.
pub fn record_base_slot(index: u64) -> Word {
    mapping_slot(&Word::from_u64(index), RECORDS_SLOT)
}

/// Base slot of the record owned by `owner`.
pub fn owner_base_slot(owner: &Address) -> Word {
    mapping_slot(&Word::from_address(owner), OWNERS_SLOT)
}

/// First slot of the identifier content of the record at `base`: `keccak256(base + 2)`.
pub fn identifier_slot(base: &Word) -> Word {
    Word::from(keccak256::hash(base.offset(IDENTIFIER_OFFSET).as_ref()))
}

fn read<R: StateReader>(reader: &R, contract: &Address, slot: &Word) -> Result<Word, Error> {
    let word = reader
        .storage_at(contract, slot)
        .map_err(|err| Error::StorageRead(Box::new(err)))?;
    trace!(?contract, ?slot, ?word, "read storage");
    Ok(word)
}

/// Read the number of registered records. Uninitialized storage reads as zero.
///
/// Counts that do not fit in a `u64` saturate to `u64::MAX`.
pub fn read_record_count<R: StateReader>(reader: &R, contract: &Address) -> Result<u64, Error> {
    let word = read(reader, contract, &Word::from_u64(RECORD_COUNT_SLOT))?;
    match word.to_u64() {
        Some(count) => Ok(count),
        None => {
            warn!(?contract, ?word, "record count exceeds u64");
            Ok(u64::MAX)
        }
    }
}

/// Reconstruct the identifier of the record at `base`.
///
/// Exactly [IDENTIFIER_WORDS] words are read, so the result never exceeds
/// [MAX_IDENTIFIER_LENGTH] characters.
pub fn decode_identifier<R: StateReader>(
    reader: &R,
    contract: &Address,
    base: &Word,
) -> Result<String, Error> {
    let start = identifier_slot(base);
    let mut identifier = String::with_capacity(MAX_IDENTIFIER_LENGTH);
    for i in 0..IDENTIFIER_WORDS {
        let word = read(reader, contract, &start.offset(i))?;
        identifier.push_str(&word.printable());
    }
    Ok(identifier)
}

/// Decode the owner of the record at `base`.
pub fn decode_address<R: StateReader>(
    reader: &R,
    contract: &Address,
    base: &Word,
) -> Result<Address, Error> {
    let word = read(reader, contract, &base.offset(OWNER_OFFSET))?;
    Ok(word.address())
}

/// Decode the key the record at `base` was registered under.
pub fn decode_record_key<R: StateReader>(
    reader: &R,
    contract: &Address,
    base: &Word,
) -> Result<Address, Error> {
    let word = read(reader, contract, &base.offset(KEY_OFFSET))?;
    Ok(word.address())
}

/// Decode the network address of the record at `base`.
pub fn decode_network_address<R: StateReader>(
    reader: &R,
    contract: &Address,
    base: &Word,
) -> Result<String, Error> {
    let word = read(reader, contract, &base.offset(NETWORK_ADDRESS_OFFSET))?;
    Ok(word.printable())
}

/// Decode the port of the record at `base`.
pub fn decode_port<R: StateReader>(
    reader: &R,
    contract: &Address,
    base: &Word,
) -> Result<String, Error> {
    let word = read(reader, contract, &base.offset(PORT_OFFSET))?;
    Ok(word.printable())
}

fn decode_at<R: StateReader>(
    reader: &R,
    contract: &Address,
    base: &Word,
    index: u64,
) -> Result<NodeRecord, Error> {
    let record = NodeRecord {
        index,
        identifier: decode_identifier(reader, contract, base)?,
        address: decode_address(reader, contract, base)?,
        network_address: decode_network_address(reader, contract, base)?,
        port: decode_port(reader, contract, base)?,
    };
    debug!(?contract, ?base, ?record, "decoded record");
    Ok(record)
}

/// Decode the record at `index`.
pub fn decode_node<R: StateReader>(
    reader: &R,
    contract: &Address,
    index: u64,
) -> Result<NodeRecord, Error> {
    decode_at(reader, contract, &record_base_slot(index), index)
}

/// Decode the record at `index` into its enode URL and owner.
pub fn decode_record<R: StateReader>(
    reader: &R,
    contract: &Address,
    index: u64,
) -> Result<(String, Address), Error> {
    let record = decode_node(reader, contract, index)?;
    Ok((record.enode_url(), record.address))
}

/// Decode the record owned by `owner` into its enode URL and owner.
pub fn decode_owner_record<R: StateReader>(
    reader: &R,
    contract: &Address,
    owner: &Address,
) -> Result<(String, Address), Error> {
    let base = owner_base_slot(owner);
    let record = decode_at(reader, contract, &base, 0)?;
    Ok((record.enode_url(), record.address))
}

/// Decode every record in `0..min(count, limit)`.
pub fn decode_records<R: StateReader>(
    reader: &R,
    contract: &Address,
    limit: u64,
) -> Result<Vec<NodeRecord>, Error> {
    let count = read_record_count(reader, contract)?;
    if count > limit {
        warn!(?contract, count, limit, "record count exceeds limit");
    }
    (0..count.min(limit))
        .map(|index| decode_node(reader, contract, index))
        .collect()
}
