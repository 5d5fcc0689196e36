use super::PublicKey;
use crate::{keccak256, Error};
use bytes::{Buf, BufMut};
use commonware_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use commonware_utils::{from_hex_formatted, hex};
use std::{
    fmt::{Debug, Display},
    ops::Deref,
    str::FromStr,
};

const ADDRESS_LENGTH: usize = 20;

/// A 20-byte account address: the last 20 bytes of the Keccak-256 digest of an
/// uncompressed public key (without its SEC 1 tag).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

    /// Create an [Address] from raw bytes.
    pub const fn new(raw: [u8; ADDRESS_LENGTH]) -> Self {
        Self(raw)
    }

    /// Derive the [Address] controlled by `public_key`.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = keccak256::hash(public_key.untagged());
        let mut raw = [0u8; ADDRESS_LENGTH];
        raw.copy_from_slice(&digest[12..]);
        Self(raw)
    }

    /// Returns the raw bytes of the address.
    pub fn to_bytes(&self) -> [u8; ADDRESS_LENGTH] {
        self.0
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(value: [u8; ADDRESS_LENGTH]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let raw: [u8; ADDRESS_LENGTH] =
            value.try_into().map_err(|_| Error::InvalidAddressLength)?;
        Ok(Self(raw))
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parses a hex-encoded address, with or without a `0x` prefix. Case is ignored
    /// (checksums are not validated).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = from_hex_formatted(s).ok_or(Error::InvalidHex)?;
        Self::try_from(raw.as_slice())
    }
}

impl Write for Address {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for Address {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let raw = <[u8; ADDRESS_LENGTH]>::read(buf)?;
        Ok(Self(raw))
    }
}

impl FixedSize for Address {
    const SIZE: usize = ADDRESS_LENGTH;
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Address {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex(&self.0))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex(&self.0))
    }
}
