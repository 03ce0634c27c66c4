//! Instruction processor
//!
//! Deterministic acceptance function for every state-changing instruction:
//! `(accounts, transaction, slot) -> Transition | rejection`. The processor
//! reads through an [`AccountReader`], validates, and returns the complete
//! set of account writes. It never mutates anything itself, so a rejected
//! instruction cannot leave partial state behind.
//!
//! Check order per instruction:
//!
//! - Register: key empty / padded with whitespace / too long / not a
//!   1184-byte ML-KEM key
//! - CreateGroup: member count, creator membership, wrapped keys, then
//!   address collisions
//! - RotateGroupKey: group exists, id matches, signer is member, wrapped
//!   keys, version overflow
//! - SendGroupMessage: field lengths, group exists, id matches, signer is
//!   member, key version, counter, id overflow
//!
//! Concurrent writers to the same group are the host's problem: the
//! counter value read here is the one consumed, and the host must serialize
//! or retry conflicting submissions.

use pqrelay_crypto::KemPublicKey;
use tracing::{debug, error, warn};

use crate::{
    accounts::{GroupCounter, GroupMessage, GroupState, MemberWrappedKey, Registry},
    address::{Address, counter_address, group_address, message_address, registry_address},
    config::ProtocolConfig,
    error::{ConfigError, ProcessError, ProtocolError},
    host::{AccountReader, AccountWrite, Receipt, Transition, read_typed},
    identity::{GroupId, Identity},
    instruction::{Instruction, Transaction},
};

/// Validates transactions against account snapshots.
#[derive(Debug, Clone, Default)]
pub struct Processor {
    config: ProtocolConfig,
}

impl Processor {
    /// Create a processor enforcing `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an instruction within the limits could
    /// produce an account too large to store.
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Limits in force.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Validate `tx` against `accounts` and compute the writes it causes.
    ///
    /// # Errors
    ///
    /// - `ProcessError::Rejected`: the instruction breaks a protocol rule
    /// - `ProcessError::Host`: reading or decoding an account failed
    pub fn validate_and_apply<R: AccountReader + ?Sized>(
        &self,
        tx: &Transaction,
        accounts: &R,
        current_slot: u64,
    ) -> Result<Transition, ProcessError> {
        let result = self.dispatch(tx, accounts, current_slot);

        match &result {
            Ok(transition) => debug!(
                instruction = tx.instruction.name(),
                signer = %tx.signer,
                slot = current_slot,
                writes = transition.writes.len(),
                "instruction accepted"
            ),
            Err(ProcessError::Rejected(err)) => warn!(
                instruction = tx.instruction.name(),
                signer = %tx.signer,
                code = err.code(),
                error = %err,
                "instruction rejected"
            ),
            Err(ProcessError::Host(err)) => error!(
                instruction = tx.instruction.name(),
                signer = %tx.signer,
                error = %err,
                "host fault while processing instruction"
            ),
        }

        result
    }

    fn dispatch<R: AccountReader + ?Sized>(
        &self,
        tx: &Transaction,
        accounts: &R,
        slot: u64,
    ) -> Result<Transition, ProcessError> {
        let signer = &tx.signer;
        match &tx.instruction {
            Instruction::Register { pq_public_key } => self.register(signer, pq_public_key, slot),
            Instruction::CreateGroup { group_id, members, wrapped_keys } => {
                self.create_group(signer, group_id, members, wrapped_keys, accounts, slot)
            },
            Instruction::RotateGroupKey { group_id, wrapped_keys } => {
                self.rotate_group_key(signer, group_id, wrapped_keys, accounts, slot)
            },
            Instruction::SendGroupMessage { group_id, key_version, ciphertext, nonce } => self
                .send_group_message(
                    signer,
                    group_id,
                    *key_version,
                    ciphertext,
                    nonce,
                    accounts,
                    slot,
                ),
        }
    }

    fn register(
        &self,
        owner: &Identity,
        pq_public_key: &str,
        slot: u64,
    ) -> Result<Transition, ProcessError> {
        self.validate_public_key(pq_public_key)?;

        let registry = registry_address(owner);
        let record =
            Registry { owner: *owner, pq_public_key: pq_public_key.to_owned(), updated_at_slot: slot };

        Ok(Transition {
            writes: vec![AccountWrite::encode(registry, &record)?],
            receipt: Receipt::Registered { owner: *owner, registry },
        })
    }

    fn create_group<R: AccountReader + ?Sized>(
        &self,
        creator: &Identity,
        group_id: &GroupId,
        members: &[Identity],
        wrapped_keys: &[MemberWrappedKey],
        accounts: &R,
        slot: u64,
    ) -> Result<Transition, ProcessError> {
        if members.is_empty() {
            return Err(ProtocolError::NoMembers.into());
        }

        if members.len() > self.config.max_members {
            return Err(ProtocolError::TooManyMembers {
                count: members.len(),
                max: self.config.max_members,
            }
            .into());
        }

        if !members.contains(creator) {
            return Err(ProtocolError::CreatorNotMember.into());
        }

        self.validate_wrapped_keys(members, wrapped_keys)?;

        let group = group_address(group_id);
        let counter = counter_address(&group);

        if accounts.read_account(&group)?.is_some() || accounts.read_account(&counter)?.is_some() {
            return Err(ProtocolError::GroupAlreadyExists(group).into());
        }

        let key_version = self.config.initial_key_version;
        let state = GroupState {
            group_id: *group_id,
            members: members.to_vec(),
            key_version,
            wrapped_keys: wrapped_keys.to_vec(),
            created_at_slot: slot,
            updated_at_slot: slot,
        };
        let counter_state = GroupCounter { group, next_id: 0 };

        Ok(Transition {
            writes: vec![
                AccountWrite::encode(group, &state)?,
                AccountWrite::encode(counter, &counter_state)?,
            ],
            receipt: Receipt::GroupCreated { group, counter, key_version },
        })
    }

    fn rotate_group_key<R: AccountReader + ?Sized>(
        &self,
        signer: &Identity,
        group_id: &GroupId,
        wrapped_keys: &[MemberWrappedKey],
        accounts: &R,
        slot: u64,
    ) -> Result<Transition, ProcessError> {
        let group = group_address(group_id);
        let mut state = load_group_for(accounts, &group, group_id, signer)?;

        self.validate_wrapped_keys(&state.members, wrapped_keys)?;

        let key_version = state.key_version.checked_add(1).ok_or(ProtocolError::MathOverflow)?;

        state.wrapped_keys = wrapped_keys.to_vec();
        state.key_version = key_version;
        state.updated_at_slot = slot;

        Ok(Transition {
            writes: vec![AccountWrite::encode(group, &state)?],
            receipt: Receipt::GroupKeyRotated { group, key_version },
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn send_group_message<R: AccountReader + ?Sized>(
        &self,
        sender: &Identity,
        group_id: &GroupId,
        key_version: u64,
        ciphertext: &[u8],
        nonce: &[u8],
        accounts: &R,
        slot: u64,
    ) -> Result<Transition, ProcessError> {
        let max_ciphertext = self.config.max_ciphertext_bytes;
        if ciphertext.is_empty() || ciphertext.len() > max_ciphertext {
            return Err(ProtocolError::CiphertextTooLong {
                len: ciphertext.len(),
                max: max_ciphertext,
            }
            .into());
        }

        let max_nonce = self.config.max_nonce_bytes;
        if nonce.is_empty() || nonce.len() > max_nonce {
            return Err(ProtocolError::NonceTooLong { len: nonce.len(), max: max_nonce }.into());
        }

        let group = group_address(group_id);
        let state = load_group_for(accounts, &group, group_id, sender)?;

        if key_version != state.key_version {
            return Err(ProtocolError::KeyVersionMismatch {
                expected: state.key_version,
                actual: key_version,
            }
            .into());
        }

        let counter = counter_address(&group);
        let Some(mut counter_state) = read_typed::<GroupCounter, _>(accounts, &counter)? else {
            return Err(ProtocolError::CounterNotFound(counter).into());
        };

        if counter_state.group != group {
            return Err(ProtocolError::CounterGroupMismatch(group).into());
        }

        let msg_id = counter_state.next_id;
        counter_state.next_id = msg_id.checked_add(1).ok_or(ProtocolError::MathOverflow)?;

        let message = message_address(&group, msg_id);
        if accounts.read_account(&message)?.is_some() {
            return Err(ProtocolError::MessageAlreadyExists(message).into());
        }

        let record = GroupMessage {
            group,
            sender: *sender,
            msg_id,
            key_version,
            ciphertext: ciphertext.to_vec(),
            nonce: nonce.to_vec(),
            created_at_slot: slot,
        };

        Ok(Transition {
            writes: vec![
                AccountWrite::encode(counter, &counter_state)?,
                AccountWrite::encode(message, &record)?,
            ],
            receipt: Receipt::MessageSent { group, message, msg_id },
        })
    }

    fn validate_public_key(&self, pq_public_key: &str) -> Result<(), ProtocolError> {
        if pq_public_key.is_empty() {
            return Err(ProtocolError::InvalidPublicKeyFormat { reason: "empty".to_owned() });
        }

        // Stored verbatim, so only the canonical text form is accepted
        if pq_public_key.trim() != pq_public_key {
            return Err(ProtocolError::InvalidPublicKeyFormat {
                reason: "surrounding whitespace".to_owned(),
            });
        }

        let chars = pq_public_key.chars().count();
        if chars > self.config.max_public_key_chars {
            return Err(ProtocolError::InvalidPublicKeyFormat {
                reason: format!(
                    "{chars} characters exceeds maximum {}",
                    self.config.max_public_key_chars
                ),
            });
        }

        KemPublicKey::from_base64(pq_public_key)
            .map(|_| ())
            .map_err(|e| ProtocolError::InvalidPublicKeyFormat { reason: e.to_string() })
    }

    /// `wrapped_keys` must name each of `members` exactly once, and each key
    /// must be 1..=max bytes.
    fn validate_wrapped_keys(
        &self,
        members: &[Identity],
        wrapped_keys: &[MemberWrappedKey],
    ) -> Result<(), ProtocolError> {
        if wrapped_keys.len() != members.len() {
            return Err(ProtocolError::WrappedKeysCountMismatch {
                wrapped: wrapped_keys.len(),
                members: members.len(),
            });
        }

        let max = self.config.max_wrapped_key_bytes;
        for entry in wrapped_keys {
            if !members.contains(&entry.member) {
                return Err(ProtocolError::WrappedKeyNotMember);
            }

            let len = entry.wrapped_key.len();
            if len == 0 || len > max {
                return Err(ProtocolError::WrappedKeyTooLong { len, max });
            }
        }

        // Equal lengths plus "every member exactly once" is a bijection. A
        // duplicated member in `members` also fails here.
        for member in members {
            let count = wrapped_keys.iter().filter(|entry| entry.member == *member).count();
            if count != 1 {
                return Err(ProtocolError::WrappedKeysMissingOrDuplicate);
            }
        }

        Ok(())
    }
}

/// Load the group at `address` and check it is `group_id` and that `signer`
/// belongs to it.
fn load_group_for<R: AccountReader + ?Sized>(
    accounts: &R,
    address: &Address,
    group_id: &GroupId,
    signer: &Identity,
) -> Result<GroupState, ProcessError> {
    let Some(state) = read_typed::<GroupState, _>(accounts, address)? else {
        return Err(ProtocolError::GroupNotFound(*address).into());
    };

    if state.group_id != *group_id {
        return Err(ProtocolError::GroupIdMismatch.into());
    }

    if !state.is_member(signer) {
        return Err(ProtocolError::NotGroupMember.into());
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{accounts::AccountData, error::HostError};

    const ALICE: Identity = Identity::from_bytes([0xa1; 32]);
    const BOB: Identity = Identity::from_bytes([0xb0; 32]);
    const CAROL: Identity = Identity::from_bytes([0xc0; 32]);
    const GROUP: GroupId = GroupId::from_bytes([0x42; 32]);

    type Accounts = HashMap<Address, Vec<u8>>;

    fn wrapped(member: Identity) -> MemberWrappedKey {
        MemberWrappedKey { member, wrapped_key: vec![member.as_bytes()[0]; 1160] }
    }

    fn apply(accounts: &mut Accounts, transition: Transition) {
        for write in transition.writes {
            accounts.insert(write.address, write.data);
        }
    }

    fn run(
        processor: &Processor,
        accounts: &mut Accounts,
        signer: Identity,
        instruction: Instruction,
        slot: u64,
    ) -> Result<Receipt, ProcessError> {
        let transition =
            processor.validate_and_apply(&Transaction::new(signer, instruction), &*accounts, slot)?;
        let receipt = transition.receipt.clone();
        apply(accounts, transition);
        Ok(receipt)
    }

    fn create(members: Vec<Identity>, wrapped_keys: Vec<MemberWrappedKey>) -> Instruction {
        Instruction::CreateGroup { group_id: GROUP, members, wrapped_keys }
    }

    fn rejection(result: Result<Receipt, ProcessError>) -> ProtocolError {
        match result {
            Err(ProcessError::Rejected(err)) => err,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    fn setup_group(processor: &Processor, accounts: &mut Accounts) {
        run(
            processor,
            accounts,
            ALICE,
            create(vec![ALICE, BOB], vec![wrapped(ALICE), wrapped(BOB)]),
            1,
        )
        .unwrap();
    }

    #[test]
    fn create_initializes_group_and_counter() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();

        let receipt = run(
            &processor,
            &mut accounts,
            ALICE,
            create(vec![ALICE, BOB], vec![wrapped(BOB), wrapped(ALICE)]),
            5,
        )
        .unwrap();

        let group = group_address(&GROUP);
        let counter = counter_address(&group);
        assert_eq!(receipt, Receipt::GroupCreated { group, counter, key_version: 0 });

        let state = GroupState::from_account_bytes(&group, &accounts[&group]).unwrap();
        assert_eq!(state.members, vec![ALICE, BOB]);
        assert_eq!(state.created_at_slot, 5);
        assert_eq!(state.updated_at_slot, 5);

        let counter_state = GroupCounter::from_account_bytes(&counter, &accounts[&counter]).unwrap();
        assert_eq!(counter_state, GroupCounter { group, next_id: 0 });
    }

    #[test]
    fn initial_key_version_is_configurable() {
        let processor = Processor::new(ProtocolConfig { initial_key_version: 1, ..Default::default() })
            .unwrap();
        let mut accounts = Accounts::new();

        let receipt =
            run(&processor, &mut accounts, ALICE, create(vec![ALICE], vec![wrapped(ALICE)]), 1)
                .unwrap();

        assert!(matches!(receipt, Receipt::GroupCreated { key_version: 1, .. }));
    }

    #[test]
    fn unstorable_limits_are_refused() {
        let result = Processor::new(ProtocolConfig { max_members: 60, ..Default::default() });
        assert!(matches!(result, Err(ConfigError::AccountTooLarge { account: "GroupState", .. })));
    }

    #[test]
    fn largest_admissible_group_is_stored() {
        let processor =
            Processor::new(ProtocolConfig { max_members: 51, ..Default::default() }).unwrap();
        let mut accounts = Accounts::new();

        let members: Vec<Identity> = (0..51u8).map(|i| Identity::from_bytes([i; 32])).collect();
        let full_keys = |fill: u8| -> Vec<MemberWrappedKey> {
            members
                .iter()
                .map(|member| MemberWrappedKey { member: *member, wrapped_key: vec![fill; 1200] })
                .collect()
        };

        // Every limit at its maximum must still be a valid write, never a codec fault
        run(&processor, &mut accounts, members[0], create(members.clone(), full_keys(1)), 1).unwrap();
        let receipt = run(
            &processor,
            &mut accounts,
            members[50],
            Instruction::RotateGroupKey { group_id: GROUP, wrapped_keys: full_keys(2) },
            2,
        )
        .unwrap();
        assert!(matches!(receipt, Receipt::GroupKeyRotated { key_version: 1, .. }));
    }

    #[test]
    fn create_rejections_follow_check_order() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();

        let err = rejection(run(&processor, &mut accounts, ALICE, create(vec![], vec![]), 1));
        assert_eq!(err, ProtocolError::NoMembers);

        let crowd: Vec<Identity> = (0..21u8).map(|i| Identity::from_bytes([i; 32])).collect();
        let err = rejection(run(&processor, &mut accounts, ALICE, create(crowd, vec![]), 1));
        assert_eq!(err, ProtocolError::TooManyMembers { count: 21, max: 20 });

        // Creator check precedes wrapped-key checks
        let err = rejection(run(&processor, &mut accounts, CAROL, create(vec![ALICE, BOB], vec![]), 1));
        assert_eq!(err, ProtocolError::CreatorNotMember);

        let err = rejection(run(
            &processor,
            &mut accounts,
            ALICE,
            create(vec![ALICE, BOB], vec![wrapped(ALICE)]),
            1,
        ));
        assert_eq!(err, ProtocolError::WrappedKeysCountMismatch { wrapped: 1, members: 2 });

        let err = rejection(run(
            &processor,
            &mut accounts,
            ALICE,
            create(vec![ALICE, BOB], vec![wrapped(ALICE), wrapped(CAROL)]),
            1,
        ));
        assert_eq!(err, ProtocolError::WrappedKeyNotMember);

        let err = rejection(run(
            &processor,
            &mut accounts,
            ALICE,
            create(vec![ALICE, BOB], vec![wrapped(ALICE), wrapped(ALICE)]),
            1,
        ));
        assert_eq!(err, ProtocolError::WrappedKeysMissingOrDuplicate);

        assert!(accounts.is_empty());
    }

    #[test]
    fn wrapped_key_bounds() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();

        let empty = MemberWrappedKey { member: ALICE, wrapped_key: Vec::new() };
        let err = rejection(run(&processor, &mut accounts, ALICE, create(vec![ALICE], vec![empty]), 1));
        assert_eq!(err, ProtocolError::WrappedKeyTooLong { len: 0, max: 1200 });

        let oversized = MemberWrappedKey { member: ALICE, wrapped_key: vec![0; 1201] };
        let err =
            rejection(run(&processor, &mut accounts, ALICE, create(vec![ALICE], vec![oversized]), 1));
        assert_eq!(err, ProtocolError::WrappedKeyTooLong { len: 1201, max: 1200 });

        let exact = MemberWrappedKey { member: ALICE, wrapped_key: vec![0; 1200] };
        assert!(run(&processor, &mut accounts, ALICE, create(vec![ALICE], vec![exact]), 1).is_ok());
    }

    #[test]
    fn duplicate_members_are_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();

        let err = rejection(run(
            &processor,
            &mut accounts,
            ALICE,
            create(vec![ALICE, ALICE], vec![wrapped(ALICE), wrapped(ALICE)]),
            1,
        ));
        assert_eq!(err, ProtocolError::WrappedKeysMissingOrDuplicate);
    }

    #[test]
    fn create_twice_is_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let err = rejection(run(
            &processor,
            &mut accounts,
            BOB,
            create(vec![BOB], vec![wrapped(BOB)]),
            2,
        ));
        assert_eq!(err, ProtocolError::GroupAlreadyExists(group_address(&GROUP)));
    }

    #[test]
    fn rotate_bumps_version_and_replaces_keys() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let fresh = vec![
            MemberWrappedKey { member: ALICE, wrapped_key: vec![0x11; 1160] },
            MemberWrappedKey { member: BOB, wrapped_key: vec![0x22; 1160] },
        ];
        let receipt = run(
            &processor,
            &mut accounts,
            BOB,
            Instruction::RotateGroupKey { group_id: GROUP, wrapped_keys: fresh.clone() },
            9,
        )
        .unwrap();

        let group = group_address(&GROUP);
        assert_eq!(receipt, Receipt::GroupKeyRotated { group, key_version: 1 });

        let state = GroupState::from_account_bytes(&group, &accounts[&group]).unwrap();
        assert_eq!(state.wrapped_keys, fresh);
        assert_eq!(state.created_at_slot, 1);
        assert_eq!(state.updated_at_slot, 9);
    }

    #[test]
    fn rotate_by_non_member_is_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let err = rejection(run(
            &processor,
            &mut accounts,
            CAROL,
            Instruction::RotateGroupKey {
                group_id: GROUP,
                wrapped_keys: vec![wrapped(ALICE), wrapped(BOB)],
            },
            2,
        ));
        assert_eq!(err, ProtocolError::NotGroupMember);
    }

    #[test]
    fn rotate_cannot_change_membership() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let err = rejection(run(
            &processor,
            &mut accounts,
            ALICE,
            Instruction::RotateGroupKey {
                group_id: GROUP,
                wrapped_keys: vec![wrapped(ALICE), wrapped(BOB), wrapped(CAROL)],
            },
            2,
        ));
        assert_eq!(err, ProtocolError::WrappedKeysCountMismatch { wrapped: 3, members: 2 });
    }

    #[test]
    fn rotate_revalidates_wrapped_keys() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let group = group_address(&GROUP);
        let stored = accounts[&group].clone();

        let cases = [
            (vec![wrapped(ALICE), wrapped(ALICE)], ProtocolError::WrappedKeysMissingOrDuplicate),
            (vec![wrapped(ALICE), wrapped(CAROL)], ProtocolError::WrappedKeyNotMember),
            (
                vec![wrapped(ALICE), MemberWrappedKey { member: BOB, wrapped_key: vec![0; 1201] }],
                ProtocolError::WrappedKeyTooLong { len: 1201, max: 1200 },
            ),
            (
                vec![MemberWrappedKey { member: ALICE, wrapped_key: Vec::new() }, wrapped(BOB)],
                ProtocolError::WrappedKeyTooLong { len: 0, max: 1200 },
            ),
        ];

        for (wrapped_keys, expected) in cases {
            let err = rejection(run(
                &processor,
                &mut accounts,
                BOB,
                Instruction::RotateGroupKey { group_id: GROUP, wrapped_keys },
                2,
            ));
            assert_eq!(err, expected);
            assert_eq!(accounts[&group], stored);
        }
    }

    #[test]
    fn rotate_unknown_group_is_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();

        let err = rejection(run(
            &processor,
            &mut accounts,
            ALICE,
            Instruction::RotateGroupKey { group_id: GROUP, wrapped_keys: vec![wrapped(ALICE)] },
            2,
        ));
        assert_eq!(err, ProtocolError::GroupNotFound(group_address(&GROUP)));
    }

    #[test]
    fn rotate_at_max_version_overflows() {
        let processor = Processor::new(ProtocolConfig {
            initial_key_version: u64::MAX,
            ..Default::default()
        })
        .unwrap();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let err = rejection(run(
            &processor,
            &mut accounts,
            ALICE,
            Instruction::RotateGroupKey {
                group_id: GROUP,
                wrapped_keys: vec![wrapped(ALICE), wrapped(BOB)],
            },
            2,
        ));
        assert_eq!(err, ProtocolError::MathOverflow);
    }

    /// Plant a group whose stored id disagrees with its address.
    fn plant_mismatched_group(accounts: &mut Accounts) -> Address {
        let group = group_address(&GROUP);
        let planted = GroupState {
            group_id: GroupId::from_bytes([0x99; 32]),
            members: vec![ALICE],
            key_version: 0,
            wrapped_keys: vec![wrapped(ALICE)],
            created_at_slot: 0,
            updated_at_slot: 0,
        };
        accounts.insert(group, planted.to_account_bytes().unwrap());
        accounts.insert(
            counter_address(&group),
            GroupCounter { group, next_id: 0 }.to_account_bytes().unwrap(),
        );
        group
    }

    #[test]
    fn stored_group_id_must_match() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        let group = plant_mismatched_group(&mut accounts);
        let stored = accounts[&group].clone();

        let err = rejection(run(
            &processor,
            &mut accounts,
            ALICE,
            Instruction::RotateGroupKey { group_id: GROUP, wrapped_keys: vec![wrapped(ALICE)] },
            1,
        ));
        assert_eq!(err, ProtocolError::GroupIdMismatch);
        assert_eq!(accounts[&group], stored);
    }

    #[test]
    fn send_to_mismatched_group_is_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        let group = plant_mismatched_group(&mut accounts);
        let before = accounts.clone();

        let err = rejection(run(&processor, &mut accounts, ALICE, send(0, vec![1], vec![1]), 1));
        assert_eq!(err, ProtocolError::GroupIdMismatch);
        assert_eq!(accounts, before);
        assert!(!accounts.contains_key(&message_address(&group, 0)));
    }

    fn send(key_version: u64, ciphertext: Vec<u8>, nonce: Vec<u8>) -> Instruction {
        Instruction::SendGroupMessage { group_id: GROUP, key_version, ciphertext, nonce }
    }

    #[test]
    fn send_allocates_sequential_ids() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let group = group_address(&GROUP);
        for expected in 0..3 {
            let receipt =
                run(&processor, &mut accounts, BOB, send(0, vec![1; 40], vec![2; 24]), 10).unwrap();
            let message = message_address(&group, expected);
            assert_eq!(receipt, Receipt::MessageSent { group, message, msg_id: expected });

            let stored = GroupMessage::from_account_bytes(&message, &accounts[&message]).unwrap();
            assert_eq!(stored.sender, BOB);
            assert_eq!(stored.created_at_slot, 10);
        }

        let counter = counter_address(&group);
        let counter_state = GroupCounter::from_account_bytes(&counter, &accounts[&counter]).unwrap();
        assert_eq!(counter_state.next_id, 3);
    }

    #[test]
    fn send_checks_field_lengths_first() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();

        // No group exists, yet the format error wins
        let err = rejection(run(&processor, &mut accounts, CAROL, send(0, vec![], vec![1]), 1));
        assert_eq!(err, ProtocolError::CiphertextTooLong { len: 0, max: 1200 });

        let err = rejection(run(&processor, &mut accounts, CAROL, send(0, vec![1; 1201], vec![1]), 1));
        assert_eq!(err, ProtocolError::CiphertextTooLong { len: 1201, max: 1200 });

        let err = rejection(run(&processor, &mut accounts, CAROL, send(0, vec![1], vec![]), 1));
        assert_eq!(err, ProtocolError::NonceTooLong { len: 0, max: 64 });

        let err = rejection(run(&processor, &mut accounts, CAROL, send(0, vec![1], vec![1; 65]), 1));
        assert_eq!(err, ProtocolError::NonceTooLong { len: 65, max: 64 });
    }

    #[test]
    fn send_accepts_maximum_lengths() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let result = run(&processor, &mut accounts, ALICE, send(0, vec![7; 1200], vec![8; 64]), 2);
        assert!(result.is_ok());
    }

    #[test]
    fn send_by_non_member_is_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let err = rejection(run(&processor, &mut accounts, CAROL, send(0, vec![1], vec![1]), 2));
        assert_eq!(err, ProtocolError::NotGroupMember);
    }

    #[test]
    fn send_with_stale_version_is_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let err = rejection(run(&processor, &mut accounts, ALICE, send(1, vec![1], vec![1]), 2));
        assert_eq!(err, ProtocolError::KeyVersionMismatch { expected: 0, actual: 1 });
    }

    #[test]
    fn send_without_counter_is_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let counter = counter_address(&group_address(&GROUP));
        accounts.remove(&counter);

        let err = rejection(run(&processor, &mut accounts, ALICE, send(0, vec![1], vec![1]), 2));
        assert_eq!(err, ProtocolError::CounterNotFound(counter));
    }

    #[test]
    fn counter_must_point_at_its_group() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let group = group_address(&GROUP);
        let counter = counter_address(&group);
        let foreign = GroupCounter { group: Address::from_bytes([0; 32]), next_id: 0 };
        accounts.insert(counter, foreign.to_account_bytes().unwrap());

        let err = rejection(run(&processor, &mut accounts, ALICE, send(0, vec![1], vec![1]), 2));
        assert_eq!(err, ProtocolError::CounterGroupMismatch(group));
    }

    #[test]
    fn exhausted_counter_overflows() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let group = group_address(&GROUP);
        let counter = counter_address(&group);
        let full = GroupCounter { group, next_id: u64::MAX };
        accounts.insert(counter, full.to_account_bytes().unwrap());

        let err = rejection(run(&processor, &mut accounts, ALICE, send(0, vec![1], vec![1]), 2));
        assert_eq!(err, ProtocolError::MathOverflow);
    }

    #[test]
    fn occupied_message_slot_is_rejected() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        setup_group(&processor, &mut accounts);

        let message = message_address(&group_address(&GROUP), 0);
        accounts.insert(message, vec![0; 8]);

        let err = rejection(run(&processor, &mut accounts, ALICE, send(0, vec![1], vec![1]), 2));
        assert_eq!(err, ProtocolError::MessageAlreadyExists(message));
    }

    #[test]
    fn register_rejects_bad_keys() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();

        for key in [String::new(), "A".repeat(2001), "not base64!".to_owned(), "AAAA".to_owned()] {
            let err = rejection(run(
                &processor,
                &mut accounts,
                ALICE,
                Instruction::Register { pq_public_key: key },
                1,
            ));
            assert!(matches!(err, ProtocolError::InvalidPublicKeyFormat { .. }));
        }
        assert!(accounts.is_empty());
    }

    #[test]
    fn register_requires_canonical_key_text() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        let key = KemPublicKey::from_bytes(&[7; 1184]).unwrap().to_base64();

        for padded in [format!(" {key}"), format!("{key}\n"), format!("\t{key} ")] {
            let err = rejection(run(
                &processor,
                &mut accounts,
                ALICE,
                Instruction::Register { pq_public_key: padded },
                1,
            ));
            assert_eq!(err, ProtocolError::InvalidPublicKeyFormat {
                reason: "surrounding whitespace".to_owned()
            });
        }
        assert!(accounts.is_empty());

        run(&processor, &mut accounts, ALICE, Instruction::Register { pq_public_key: key.clone() }, 2)
            .unwrap();
        let registry = registry_address(&ALICE);
        let stored = Registry::from_account_bytes(&registry, &accounts[&registry]).unwrap();
        assert_eq!(stored.pq_public_key, key);
    }

    #[test]
    fn corrupt_group_account_is_host_fault() {
        let processor = Processor::default();
        let mut accounts = Accounts::new();
        accounts.insert(group_address(&GROUP), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let result = run(&processor, &mut accounts, ALICE, send(0, vec![1], vec![1]), 1);
        assert!(matches!(result, Err(ProcessError::Host(HostError::CorruptAccount { .. }))));
    }
}
