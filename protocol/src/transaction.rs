//! Build and sign the transaction that carries collected attestations.
//!
//! Validation transactions are legacy (pre-EIP-2718) Ethereum transactions, replay-protected
//! with EIP-155. The attestation payload ([NodeValidations]) is carried as call data and the
//! transaction transfers no value.
//!
//! # Encoding
//!
//! ```text
//! signing payload = rlp([nonce, gas_price, gas_limit, to, value, data, chain_id, 0, 0])
//! signing hash    = keccak256(signing payload)
//! signed          = rlp([nonce, gas_price, gas_limit, to, value, data, v, r, s])
//! v               = recovery_id + 2 * chain_id + 35
//! ```

use crate::{ChainClient, Config, Error, NodeValidations};
use dnp_cryptography::{keccak256, Address, Digest, PrivateKey, Signature};
use rlp::{Rlp, RlpStream};
use tracing::{debug, info};

const TRANSACTION_FIELDS: usize = 9;
const SCALAR_LENGTH: usize = 32;
const EIP155_OFFSET: u64 = 35;

/// An unsigned legacy transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Sender nonce.
    pub nonce: u64,

    /// Price paid per unit of gas (in wei).
    pub gas_price: u64,

    /// Maximum gas the transaction may consume.
    pub gas_limit: u64,

    /// Recipient.
    pub to: Address,

    /// Value transferred (in wei).
    pub value: u64,

    /// Call data.
    pub data: Vec<u8>,
}

impl Transaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        stream.append(&self.to.to_bytes().as_slice());
        stream.append(&self.value);
        stream.append(&self.data.as_slice());
    }

    /// Returns the EIP-155 signing payload for `chain_id`.
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut stream = RlpStream::new_list(TRANSACTION_FIELDS);
        self.append_fields(&mut stream);
        stream.append(&chain_id);
        stream.append(&0u64);
        stream.append(&0u64);
        stream.out().to_vec()
    }

    /// Returns the EIP-155 signing hash for `chain_id`.
    pub fn signing_hash(&self, chain_id: u64) -> Digest {
        keccak256::hash(&self.signing_payload(chain_id))
    }

    /// Sign the transaction for `chain_id`.
    ///
    /// Signing is deterministic (RFC 6979): the same inputs always produce the same bytes.
    pub fn sign(self, key: &PrivateKey, chain_id: u64) -> Result<SignedTransaction, Error> {
        // The largest v must fit in a u64
        chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(EIP155_OFFSET + 1))
            .ok_or(Error::InvalidTransaction("chain id too large"))?;
        let signature = key
            .sign_prehash(&self.signing_hash(chain_id))
            .map_err(Error::Signing)?;
        Ok(SignedTransaction {
            transaction: self,
            chain_id,
            signature,
        })
    }
}

/// A [Transaction] signed for a specific chain.
///
/// Only [Transaction::sign] and [SignedTransaction::decode] construct this type, and both keep
/// `v` within a `u64`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    transaction: Transaction,
    chain_id: u64,
    signature: Signature,
}

impl SignedTransaction {
    /// Returns the signed [Transaction].
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Returns the chain id the transaction was signed for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Returns the EIP-155 `v` value.
    pub fn v(&self) -> u64 {
        self.signature.v() as u64 + 2 * self.chain_id + EIP155_OFFSET
    }

    /// Returns the recoverable signature over the signing hash.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns the RLP encoding of the signed transaction.
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(TRANSACTION_FIELDS);
        self.transaction.append_fields(&mut stream);
        stream.append(&self.v());
        stream.append(&trim_leading_zeros(self.signature.r()));
        stream.append(&trim_leading_zeros(self.signature.s()));
        stream.out().to_vec()
    }

    /// Returns the transaction hash: the Keccak-256 digest of the signed encoding.
    pub fn hash(&self) -> Digest {
        keccak256::hash(&self.encode())
    }

    /// Returns the address that signed the transaction.
    pub fn recover_sender(&self) -> Result<Address, Error> {
        let public_key = self
            .signature
            .recover_prehash(&self.transaction.signing_hash(self.chain_id))
            .map_err(Error::Recovery)?;
        Ok(public_key.address())
    }

    /// Decode an EIP-155 signed transaction.
    ///
    /// Unprotected (pre-EIP-155) transactions are rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let rlp = Rlp::new(bytes);
        if !rlp.is_list() {
            return Err(Error::InvalidTransaction("not a list"));
        }
        if rlp.payload_info()?.total() != bytes.len() {
            return Err(Error::InvalidTransaction("trailing bytes"));
        }
        if rlp.item_count()? != TRANSACTION_FIELDS {
            return Err(Error::InvalidTransaction("unexpected field count"));
        }
        let to: Vec<u8> = rlp.val_at(3)?;
        let to = Address::try_from(to.as_slice())
            .map_err(|_| Error::InvalidTransaction("invalid recipient"))?;
        let transaction = Transaction {
            nonce: rlp.val_at(0)?,
            gas_price: rlp.val_at(1)?,
            gas_limit: rlp.val_at(2)?,
            to,
            value: rlp.val_at(4)?,
            data: rlp.val_at(5)?,
        };

        let v: u64 = rlp.val_at(6)?;
        if v < EIP155_OFFSET {
            return Err(Error::InvalidTransaction("unprotected transaction"));
        }
        let chain_id = (v - EIP155_OFFSET) / 2;
        let recovery_id = ((v - EIP155_OFFSET) % 2) as u8;

        let mut raw = [0u8; 65];
        left_pad(&rlp.val_at::<Vec<u8>>(7)?, &mut raw[..SCALAR_LENGTH])?;
        left_pad(&rlp.val_at::<Vec<u8>>(8)?, &mut raw[SCALAR_LENGTH..2 * SCALAR_LENGTH])?;
        raw[64] = recovery_id;

        Ok(Self {
            transaction,
            chain_id,
            signature: Signature::from(raw),
        })
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn left_pad(value: &[u8], out: &mut [u8]) -> Result<(), Error> {
    if value.len() > out.len() {
        return Err(Error::InvalidTransaction("signature scalar too long"));
    }
    let start = out.len() - value.len();
    out[start..].copy_from_slice(value);
    Ok(())
}

/// Build a zero-value transaction to `target` carrying `validations` as call data, signed by
/// `key` for `chain_id`.
pub fn build_validation_transaction(
    key: &PrivateKey,
    validations: &NodeValidations,
    nonce: u64,
    gas_limit: u64,
    gas_price: u64,
    chain_id: u64,
    target: &Address,
) -> Result<SignedTransaction, Error> {
    let transaction = Transaction {
        nonce,
        gas_price,
        gas_limit,
        to: *target,
        value: 0,
        data: validations.to_bytes()?,
    };
    let signed = transaction.sign(key, chain_id)?;
    debug!(
        nonce,
        chain_id,
        %target,
        validations = validations.len(),
        hash = %signed.hash(),
        "built validation transaction"
    );
    Ok(signed)
}

/// Build a validation transaction using the pending nonce and network id reported by `client`
/// and broadcast it.
pub fn send_validations<C: ChainClient>(
    client: &C,
    key: &PrivateKey,
    validations: &NodeValidations,
    cfg: &Config,
) -> Result<SignedTransaction, Error> {
    let sender = key.address();
    let nonce = client
        .pending_nonce(&sender)
        .map_err(|err| Error::Client(Box::new(err)))?;
    let chain_id = client
        .network_id()
        .map_err(|err| Error::Client(Box::new(err)))?;
    let signed = build_validation_transaction(
        key,
        validations,
        nonce,
        cfg.gas_limit,
        cfg.gas_price,
        chain_id,
        &cfg.validation_address,
    )?;
    let hash = client
        .broadcast(&signed)
        .map_err(|err| Error::Client(Box::new(err)))?;
    info!(%sender, nonce, chain_id, %hash, "sent validation transaction");
    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attestation,
        mocks::{Client, Error as MockError},
        DEFAULT_GAS_LIMIT, DEFAULT_VALIDATION_ADDRESS,
    };
    use commonware_macros::test_traced;
    use commonware_utils::{from_hex_formatted, hex};

    fn eip155_example() -> (PrivateKey, Transaction) {
        let key = PrivateKey::try_from(vec![0x46; 32]).unwrap();
        let transaction = Transaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Address::new([0x35; 20]),
            value: 1_000_000_000_000_000_000,
            data: Vec::new(),
        };
        (key, transaction)
    }

    fn validations() -> NodeValidations {
        let id = "ab".repeat(64);
        let mut validations = NodeValidations::new(id.as_bytes());
        for seed in 0..3 {
            let key = PrivateKey::from_seed(seed);
            validations.push(attestation::sign(&key, id.as_bytes()).unwrap());
        }
        validations
    }

    #[test]
    fn test_eip155_signing_payload() {
        let (_, transaction) = eip155_example();
        assert_eq!(
            hex(&transaction.signing_payload(1)),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex(transaction.signing_hash(1).as_ref()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signed() {
        let (key, transaction) = eip155_example();
        let signed = transaction.sign(&key, 1).unwrap();
        assert_eq!(signed.v(), 37);
        assert_eq!(
            hex(&signed.encode()),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(signed.recover_sender().unwrap(), key.address());
    }

    #[test]
    fn test_decode_known() {
        let raw = from_hex_formatted("0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83").unwrap();
        let decoded = SignedTransaction::decode(&raw).unwrap();
        let (key, transaction) = eip155_example();
        assert_eq!(*decoded.transaction(), transaction);
        assert_eq!(decoded.chain_id(), 1);
        assert_eq!(decoded.recover_sender().unwrap(), key.address());
        assert_eq!(decoded.encode(), raw);
    }

    #[test_traced]
    fn test_build_deterministic() {
        let key = PrivateKey::from_seed(42);
        let validations = validations();
        let first = build_validation_transaction(
            &key,
            &validations,
            7,
            DEFAULT_GAS_LIMIT,
            0,
            1337,
            &DEFAULT_VALIDATION_ADDRESS,
        )
        .unwrap();
        let second = build_validation_transaction(
            &key,
            &validations,
            7,
            DEFAULT_GAS_LIMIT,
            0,
            1337,
            &DEFAULT_VALIDATION_ADDRESS,
        )
        .unwrap();
        assert_eq!(first.encode(), second.encode());
        assert_eq!(first.hash(), second.hash());

        // A different nonce changes the transaction
        let third = build_validation_transaction(
            &key,
            &validations,
            8,
            DEFAULT_GAS_LIMIT,
            0,
            1337,
            &DEFAULT_VALIDATION_ADDRESS,
        )
        .unwrap();
        assert_ne!(first.hash(), third.hash());
    }

    #[test_traced]
    fn test_build_payload() {
        let key = PrivateKey::from_seed(42);
        let validations = validations();
        let signed = build_validation_transaction(
            &key,
            &validations,
            0,
            DEFAULT_GAS_LIMIT,
            0,
            1337,
            &DEFAULT_VALIDATION_ADDRESS,
        )
        .unwrap();
        let decoded = SignedTransaction::decode(&signed.encode()).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.chain_id(), 1337);
        assert_eq!(decoded.transaction().value, 0);
        assert_eq!(decoded.transaction().gas_price, 0);
        assert_eq!(decoded.transaction().gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(decoded.transaction().to, DEFAULT_VALIDATION_ADDRESS);
        assert_eq!(decoded.recover_sender().unwrap(), key.address());

        let payload = NodeValidations::from_bytes(&decoded.transaction().data).unwrap();
        assert_eq!(payload, validations);
        let signers = attestation::recover_signers(&payload).unwrap();
        let expected: Vec<_> = (0..3)
            .map(|seed| PrivateKey::from_seed(seed).address())
            .collect();
        assert_eq!(signers, expected);
    }

    #[test]
    fn test_build_chain_id_too_large() {
        let key = PrivateKey::from_seed(0);
        assert!(matches!(
            build_validation_transaction(
                &key,
                &NodeValidations::default(),
                0,
                DEFAULT_GAS_LIMIT,
                0,
                u64::MAX,
                &DEFAULT_VALIDATION_ADDRESS,
            ),
            Err(Error::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_decode_invalid() {
        assert!(SignedTransaction::decode(&[]).is_err());
        assert!(matches!(
            SignedTransaction::decode(&[0x80]),
            Err(Error::InvalidTransaction(_))
        ));

        let (key, transaction) = eip155_example();
        let mut encoded = transaction.sign(&key, 1).unwrap().encode();
        encoded.push(0);
        assert!(matches!(
            SignedTransaction::decode(&encoded),
            Err(Error::InvalidTransaction(_))
        ));

        // Unprotected v
        let (_, transaction) = eip155_example();
        let mut stream = RlpStream::new_list(TRANSACTION_FIELDS);
        transaction.append_fields(&mut stream);
        stream.append(&27u64);
        stream.append(&[1u8; 32].as_slice());
        stream.append(&[1u8; 32].as_slice());
        assert!(matches!(
            SignedTransaction::decode(&stream.out()),
            Err(Error::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_decode_max_chain_id() {
        // The largest v a decoder accepts must re-encode without overflow
        let (_, transaction) = eip155_example();
        let mut stream = RlpStream::new_list(TRANSACTION_FIELDS);
        transaction.append_fields(&mut stream);
        stream.append(&u64::MAX);
        stream.append(&[1u8; 32].as_slice());
        stream.append(&[1u8; 32].as_slice());
        let raw = stream.out().to_vec();

        let decoded = SignedTransaction::decode(&raw).unwrap();
        assert_eq!(decoded.chain_id(), (u64::MAX - EIP155_OFFSET) / 2);
        assert_eq!(decoded.v(), u64::MAX);
        assert_eq!(decoded.encode(), raw);
        assert_eq!(decoded.hash(), keccak256::hash(&raw));
    }

    #[test]
    fn test_signed_accessors() {
        let (key, transaction) = eip155_example();
        let signed = transaction.clone().sign(&key, 1).unwrap();
        assert_eq!(signed.transaction(), &transaction);
        assert_eq!(signed.chain_id(), 1);
        assert_eq!(signed.signature().v(), (signed.v() - 37) as u8);

        // The largest chain id whose v fits is accepted
        let max = (u64::MAX - EIP155_OFFSET - 1) / 2;
        let signed = transaction.clone().sign(&key, max).unwrap();
        assert_eq!(signed.chain_id(), max);
        assert!(signed.v() >= u64::MAX - 2);
        assert_eq!(SignedTransaction::decode(&signed.encode()).unwrap(), signed);
        assert!(matches!(
            transaction.sign(&key, max + 1),
            Err(Error::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_trim_leading_zeros() {
        assert_eq!(trim_leading_zeros(&[0, 0, 1, 0]), &[1, 0]);
        assert_eq!(trim_leading_zeros(&[0, 0]), &[] as &[u8]);
        assert_eq!(trim_leading_zeros(&[5]), &[5]);
    }

    #[test_traced]
    fn test_send_validations() {
        let client = Client::new(3, 1337);
        let key = PrivateKey::from_seed(42);
        let cfg = Config::default();
        let signed = send_validations(&client, &key, &validations(), &cfg).unwrap();
        assert_eq!(signed.transaction().nonce, 3);
        assert_eq!(signed.chain_id(), 1337);
        assert_eq!(signed.transaction().to, DEFAULT_VALIDATION_ADDRESS);
        assert_eq!(client.broadcasts(), vec![signed]);
    }

    #[test_traced]
    fn test_send_validations_client_error() {
        let client = Client::failing(MockError::Unavailable);
        let key = PrivateKey::from_seed(42);
        assert!(matches!(
            send_validations(&client, &key, &validations(), &Config::default()),
            Err(Error::Client(_))
        ));
        assert!(client.broadcasts().is_empty());
    }
}
