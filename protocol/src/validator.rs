//! Decide whether a transaction may invoke the node-protocol contract.
//!
//! A transaction is a valid protocol transaction iff:
//!
//! 1. the protocol is active at the current height,
//! 2. its recipient is a registered node-protocol contract, and
//! 3. its sender is a candidate (as decided by a [CandidacyChecker]).
//!
//! The gates are evaluated in that order and evaluation stops at the first denial. A denial is
//! `Ok(false)`; `Err(_)` is only returned when candidacy could not be decided.

use crate::{layout, CandidacyChecker, Config, Error, StateReader};
use dnp_cryptography::Address;
use std::collections::BTreeSet;
use tracing::debug;

/// Returns whether a transaction from `sender` to `recipient` at `current_height` may invoke the
/// node-protocol contract.
pub fn is_valid_protocol_transaction<C: CandidacyChecker>(
    current_height: u64,
    activation_height: u64,
    registered: &BTreeSet<Address>,
    recipient: &Address,
    sender: &Address,
    candidacy: &C,
) -> Result<bool, Error> {
    if current_height < activation_height {
        debug!(
            %sender,
            %recipient,
            current_height,
            activation_height,
            "protocol not active"
        );
        return Ok(false);
    }
    if !registered.contains(recipient) {
        debug!(%sender, %recipient, current_height, "recipient not registered");
        return Ok(false);
    }
    let candidate = candidacy.is_candidate(sender)?;
    debug!(%sender, %recipient, current_height, candidate, "checked candidacy");
    Ok(candidate)
}

/// A [CandidacyChecker] that accepts senders owning a node record in a contract's storage.
///
/// At most `limit` records are scanned. Records with an empty identifier are ignored.
pub struct RegisteredNodes<'a, R: StateReader> {
    reader: &'a R,
    contract: Address,
    limit: u64,
}

impl<'a, R: StateReader> RegisteredNodes<'a, R> {
    /// Create a new [RegisteredNodes] backed by the records of `contract`.
    pub fn new(reader: &'a R, contract: Address, limit: u64) -> Self {
        Self {
            reader,
            contract,
            limit,
        }
    }
}

impl<R: StateReader> CandidacyChecker for RegisteredNodes<'_, R> {
    fn is_candidate(&self, sender: &Address) -> Result<bool, Error> {
        let count = layout::read_record_count(self.reader, &self.contract)?;
        for index in 0..count.min(self.limit) {
            let base = layout::record_base_slot(index);
            if layout::decode_address(self.reader, &self.contract, &base)? != *sender {
                continue;
            }
            if layout::decode_identifier(self.reader, &self.contract, &base)?.is_empty() {
                continue;
            }
            debug!(%sender, contract = %self.contract, index, "found owned record");
            return Ok(true);
        }
        Ok(false)
    }
}

/// Applies [is_valid_protocol_transaction] with the activation height and registered contracts
/// of a [Config].
#[derive(Clone, Debug)]
pub struct Validator {
    activation_height: u64,
    registered: BTreeSet<Address>,
}

impl Validator {
    /// Create a new [Validator] from `cfg`.
    pub fn new(cfg: &Config) -> Self {
        Self {
            activation_height: cfg.activation_height,
            registered: cfg.registered_contracts(),
        }
    }

    /// Returns true if the protocol is active at `height`.
    pub fn is_active(&self, height: u64) -> bool {
        height >= self.activation_height
    }

    /// Returns the set of registered node-protocol contracts.
    pub fn registered(&self) -> &BTreeSet<Address> {
        &self.registered
    }

    /// Returns whether a transaction from `sender` to `recipient` at `height` may invoke the
    /// node-protocol contract.
    pub fn validate<C: CandidacyChecker>(
        &self,
        height: u64,
        recipient: &Address,
        sender: &Address,
        candidacy: &C,
    ) -> Result<bool, Error> {
        is_valid_protocol_transaction(
            height,
            self.activation_height,
            &self.registered,
            recipient,
            sender,
            candidacy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks::{AllowList, FailingState, MemoryState},
        NodeRecord, NodeType,
    };
    use commonware_macros::test_traced;
    use std::cell::Cell;
    use test_case::test_case;

    const CONTRACT: Address = Address::new([0xaa; 20]);
    const TX_ADDRESS: Address = Address::new([0xbb; 20]);
    const SENDER: Address = Address::new([0x11; 20]);
    const STRANGER: Address = Address::new([0x22; 20]);

    /// Records whether it was consulted.
    struct Consulted {
        answer: bool,
        called: Cell<bool>,
    }

    impl Consulted {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                called: Cell::new(false),
            }
        }
    }

    impl CandidacyChecker for Consulted {
        fn is_candidate(&self, _: &Address) -> Result<bool, Error> {
            self.called.set(true);
            Ok(self.answer)
        }
    }

    fn registered() -> BTreeSet<Address> {
        BTreeSet::from([TX_ADDRESS])
    }

    fn state_with_owner(owner: Address, identifier: &str) -> MemoryState {
        let mut state = MemoryState::default();
        state.insert_record(
            &CONTRACT,
            &NodeRecord {
                index: 0,
                identifier: identifier.to_string(),
                address: owner,
                network_address: "203.0.113.5".into(),
                port: "30303".into(),
            },
        );
        state.insert_record_count(&CONTRACT, 1);
        state
    }

    #[test_case(0, 100, false; "genesis")]
    #[test_case(99, 100, false; "one before")]
    #[test_case(100, 100, true; "at activation")]
    #[test_case(u64::MAX, 100, true; "far after")]
    #[test_case(0, 0, true; "active from genesis")]
    fn test_height_gate(height: u64, activation: u64, expected: bool) {
        let consulted = Consulted::new(true);
        let valid = is_valid_protocol_transaction(
            height,
            activation,
            &registered(),
            &TX_ADDRESS,
            &SENDER,
            &consulted,
        )
        .unwrap();
        assert_eq!(valid, expected);
        assert_eq!(consulted.called.get(), expected);
    }

    #[test_traced]
    fn test_recipient_gate() {
        let consulted = Consulted::new(true);
        let valid =
            is_valid_protocol_transaction(200, 100, &registered(), &CONTRACT, &SENDER, &consulted)
                .unwrap();
        assert!(!valid);
        assert!(!consulted.called.get());

        // Nothing registered
        let valid =
            is_valid_protocol_transaction(200, 100, &BTreeSet::new(), &TX_ADDRESS, &SENDER, &consulted)
                .unwrap();
        assert!(!valid);
        assert!(!consulted.called.get());
    }

    #[test_traced]
    fn test_candidacy_decides() {
        let allowed = AllowList::new([SENDER]);
        assert!(
            is_valid_protocol_transaction(200, 100, &registered(), &TX_ADDRESS, &SENDER, &allowed)
                .unwrap()
        );
        assert!(!is_valid_protocol_transaction(
            200,
            100,
            &registered(),
            &TX_ADDRESS,
            &STRANGER,
            &allowed
        )
        .unwrap());
    }

    #[test_traced]
    fn test_registered_nodes() {
        let state = state_with_owner(SENDER, &"ab".repeat(64));
        let candidacy = RegisteredNodes::new(&state, CONTRACT, 16);
        assert!(candidacy.is_candidate(&SENDER).unwrap());
        assert!(!candidacy.is_candidate(&STRANGER).unwrap());

        // Records beyond the limit are not scanned
        let candidacy = RegisteredNodes::new(&state, CONTRACT, 0);
        assert!(!candidacy.is_candidate(&SENDER).unwrap());
    }

    #[test]
    fn test_registered_nodes_empty_identifier() {
        let state = state_with_owner(SENDER, "");
        let candidacy = RegisteredNodes::new(&state, CONTRACT, 16);
        assert!(!candidacy.is_candidate(&SENDER).unwrap());
    }

    #[test]
    fn test_registered_nodes_empty_contract() {
        // Unset records have a zero owner, which must not make the zero address a candidate
        let mut state = MemoryState::default();
        state.insert_record_count(&CONTRACT, 4);
        let candidacy = RegisteredNodes::new(&state, CONTRACT, 16);
        assert!(!candidacy.is_candidate(&Address::ZERO).unwrap());
    }

    #[test_traced]
    fn test_candidacy_error() {
        let state = FailingState;
        let candidacy = RegisteredNodes::new(&state, CONTRACT, 16);
        assert!(matches!(
            is_valid_protocol_transaction(200, 100, &registered(), &TX_ADDRESS, &SENDER, &candidacy),
            Err(Error::StorageRead(_))
        ));

        // Gates are evaluated before candidacy
        assert!(!is_valid_protocol_transaction(
            50,
            100,
            &registered(),
            &TX_ADDRESS,
            &SENDER,
            &candidacy
        )
        .unwrap());
    }

    #[test_traced]
    fn test_validator() {
        let cfg = Config {
            activation_height: 10,
            node_types: vec![NodeType {
                name: "service".into(),
                tx_address: TX_ADDRESS,
                contract_address: CONTRACT,
            }],
            ..Default::default()
        };
        let validator = Validator::new(&cfg);
        assert!(!validator.is_active(9));
        assert!(validator.is_active(10));
        assert_eq!(validator.registered(), &registered());

        let state = state_with_owner(SENDER, &"ab".repeat(64));
        let candidacy = RegisteredNodes::new(&state, CONTRACT, cfg.max_records);
        assert!(validator
            .validate(10, &TX_ADDRESS, &SENDER, &candidacy)
            .unwrap());
        assert!(!validator
            .validate(9, &TX_ADDRESS, &SENDER, &candidacy)
            .unwrap());
        assert!(!validator
            .validate(10, &CONTRACT, &SENDER, &candidacy)
            .unwrap());
        assert!(!validator
            .validate(10, &TX_ADDRESS, &STRANGER, &candidacy)
            .unwrap());
    }
}
