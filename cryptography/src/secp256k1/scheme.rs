use super::Address;
use crate::{keccak256, Digest, Error};
use bytes::{Buf, BufMut};
use commonware_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use commonware_utils::hex;
use k256::ecdsa::{RecoveryId, Signature as ISignature, SigningKey, VerifyingKey};
use rand::{rngs::StdRng, CryptoRng, Rng, SeedableRng};
use std::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    ops::Deref,
};
use zeroize::Zeroizing;

const PRIVATE_KEY_LENGTH: usize = 32;
const PUBLIC_KEY_LENGTH: usize = 65; // 0x04 || X || Y
const SIGNATURE_LENGTH: usize = 65; // R || S || V
const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;

/// Secp256k1 Private Key.
#[derive(Clone)]
pub struct PrivateKey {
    raw: Zeroizing<[u8; PRIVATE_KEY_LENGTH]>,
    key: SigningKey,
}

impl PrivateKey {
    /// Create a fresh [PrivateKey] using the supplied RNG.
    pub fn from_rng<R: Rng + CryptoRng>(rng: &mut R) -> Self {
        Self::from(SigningKey::random(rng))
    }

    /// Create a [PrivateKey] from a seed.
    ///
    /// # Warning
    ///
    /// This function is insecure and should only be used for examples
    /// and testing.
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::from_rng(&mut rng)
    }

    /// Returns the [PublicKey] corresponding to this [PrivateKey].
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.key.verifying_key().clone())
    }

    /// Returns the [Address] controlled by this [PrivateKey].
    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    /// Sign a 32-byte prehash.
    ///
    /// The returned [Signature] is deterministic (RFC 6979) and low-S normalized.
    pub fn sign_prehash(&self, prehash: &Digest) -> Result<Signature, Error> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(prehash.as_ref())
            .map_err(|_| Error::SigningFailed)?;
        Ok(Signature::from_parts(&signature, recovery_id))
    }

    /// Sign the Keccak-256 digest of `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, Error> {
        self.sign_prehash(&keccak256::hash(message))
    }
}

impl From<SigningKey> for PrivateKey {
    fn from(key: SigningKey) -> Self {
        let raw: [u8; PRIVATE_KEY_LENGTH] = key.to_bytes().into();
        Self {
            raw: Zeroizing::new(raw),
            key,
        }
    }
}

impl TryFrom<&[u8]> for PrivateKey {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        // `SigningKey::from_slice` left-pads short inputs, so we check the length first.
        let raw: [u8; PRIVATE_KEY_LENGTH] = value
            .try_into()
            .map_err(|_| Error::InvalidPrivateKeyLength)?;
        let key = SigningKey::from_slice(&raw).map_err(|_| Error::InvalidPrivateKey)?;
        Ok(Self {
            raw: Zeroizing::new(raw),
            key,
        })
    }
}

impl TryFrom<&Vec<u8>> for PrivateKey {
    type Error = Error;
    fn try_from(value: &Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl TryFrom<Vec<u8>> for PrivateKey {
    type Error = Error;
    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let value = Zeroizing::new(value);
        Self::try_from(value.as_slice())
    }
}

impl AsRef<[u8]> for PrivateKey {
    fn as_ref(&self) -> &[u8] {
        self.raw.as_ref()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PrivateKey {}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({})", self.address())
    }
}

/// Secp256k1 Public Key (SEC 1 uncompressed form).
#[derive(Clone)]
pub struct PublicKey {
    raw: [u8; PUBLIC_KEY_LENGTH],
}

impl PublicKey {
    /// Returns the [Address] derived from this [PublicKey].
    pub fn address(&self) -> Address {
        Address::from_public_key(self)
    }

    /// Returns the 64-byte public key without the SEC 1 tag (the form used as a node identifier).
    pub fn untagged(&self) -> &[u8] {
        &self.raw[1..]
    }

    /// Returns the hex-encoded node identifier (128 characters, no prefix).
    pub fn node_id(&self) -> String {
        hex(self.untagged())
    }

    /// Verify that `signature` was produced over the Keccak-256 digest of `message`
    /// by this [PublicKey].
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        match signature.recover(message) {
            Ok(recovered) => recovered == *self,
            Err(_) => false,
        }
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        let encoded = key.to_encoded_point(false);
        let mut raw = [0u8; PUBLIC_KEY_LENGTH];
        raw.copy_from_slice(encoded.as_bytes());
        Self { raw }
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let raw: [u8; PUBLIC_KEY_LENGTH] = value
            .try_into()
            .map_err(|_| Error::InvalidPublicKeyLength)?;
        if raw[0] != SEC1_UNCOMPRESSED_TAG {
            return Err(Error::InvalidPublicKey);
        }
        VerifyingKey::from_sec1_bytes(&raw).map_err(|_| Error::InvalidPublicKey)?;
        Ok(Self { raw })
    }
}

impl TryFrom<&Vec<u8>> for PublicKey {
    type Error = Error;
    fn try_from(value: &Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl Write for PublicKey {
    fn write(&self, buf: &mut impl BufMut) {
        self.raw.write(buf);
    }
}

impl Read for PublicKey {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let raw = <[u8; PUBLIC_KEY_LENGTH]>::read(buf)?;
        Self::try_from(raw.as_slice())
            .map_err(|_| CodecError::Invalid("secp256k1::PublicKey", "invalid point"))
    }
}

impl FixedSize for PublicKey {
    const SIZE: usize = PUBLIC_KEY_LENGTH;
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Deref for PublicKey {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.raw
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

/// Secp256k1 recoverable signature (`r || s || v`).
///
/// The signature is stored as received; its components are only checked when a signer is
/// recovered from it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    fn from_parts(signature: &ISignature, recovery_id: RecoveryId) -> Self {
        let mut raw = [0u8; SIGNATURE_LENGTH];
        raw[..64].copy_from_slice(&signature.to_bytes());
        raw[64] = recovery_id.to_byte();
        Self(raw)
    }

    /// Returns the big-endian `r` component.
    pub fn r(&self) -> &[u8] {
        &self.0[..32]
    }

    /// Returns the big-endian `s` component.
    pub fn s(&self) -> &[u8] {
        &self.0[32..64]
    }

    /// Returns the recovery id (`0` or `1` for well-formed signatures).
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Recover the [PublicKey] that produced this signature over `prehash`.
    pub fn recover_prehash(&self, prehash: &Digest) -> Result<PublicKey, Error> {
        let v = self.v();
        if v > 1 {
            return Err(Error::InvalidRecoveryId(v));
        }
        let recovery_id = RecoveryId::from_byte(v).ok_or(Error::InvalidRecoveryId(v))?;
        let signature = ISignature::from_slice(&self.0[..64]).map_err(|_| Error::InvalidSignature)?;
        let key = VerifyingKey::recover_from_prehash(prehash.as_ref(), &signature, recovery_id)
            .map_err(|_| Error::RecoveryFailed)?;
        Ok(PublicKey::from(key))
    }

    /// Recover the [PublicKey] that produced this signature over the Keccak-256 digest of `message`.
    pub fn recover(&self, message: &[u8]) -> Result<PublicKey, Error> {
        self.recover_prehash(&keccak256::hash(message))
    }
}

impl From<[u8; SIGNATURE_LENGTH]> for Signature {
    fn from(value: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let raw: [u8; SIGNATURE_LENGTH] = value
            .try_into()
            .map_err(|_| Error::InvalidSignatureLength)?;
        Ok(Self(raw))
    }
}

impl TryFrom<&Vec<u8>> for Signature {
    type Error = Error;
    fn try_from(value: &Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl TryFrom<Vec<u8>> for Signature {
    type Error = Error;
    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl Write for Signature {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for Signature {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let raw = <[u8; SIGNATURE_LENGTH]>::read(buf)?;
        Ok(Self(raw))
    }
}

impl FixedSize for Signature {
    const SIZE: usize = SIGNATURE_LENGTH;
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Signature {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}
