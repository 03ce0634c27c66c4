//! End-to-end group flow with real key material.
//!
//! Exercises the same path a client takes:
//! 1. Members generate ML-KEM-768 key pairs and register them
//! 2. The founder resolves registry keys and wraps a fresh group key
//! 3. Members seal messages under the group key and submit them
//! 4. Readers page messages back and decrypt with their unwrapped key

use pqrelay_core::{
    ErrorKind, GroupId, Identity, Instruction, Ledger, MemberWrappedKey, MemoryLedger,
    ProcessError, ProtocolConfig, ProtocolError, Receipt, Transaction, load_counter, load_group,
    load_messages, load_registry, member_recipients, wrapped_key_for,
};
use pqrelay_crypto::{
    GroupKey, KemKeyPair, decrypt_group_message, encrypt_group_message, generate_group_key,
    unwrap_group_key, wrap_for_members,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

const GROUP_ID: GroupId = GroupId::from_bytes([1; 32]);

struct Party {
    identity: Identity,
    keys: KemKeyPair,
}

fn party(tag: u8, rng: &mut ChaCha20Rng) -> Party {
    Party { identity: Identity::from_bytes([tag; 32]), keys: KemKeyPair::generate(rng) }
}

fn register(ledger: &MemoryLedger, party: &Party) {
    let tx = Transaction::new(party.identity, Instruction::Register {
        pq_public_key: party.keys.public.to_base64(),
    });
    ledger.submit(&tx).unwrap();
}

fn wrap(
    ledger: &MemoryLedger,
    members: &[Identity],
    group_key: &GroupKey,
    rng: &mut ChaCha20Rng,
) -> Vec<MemberWrappedKey> {
    let recipients = member_recipients(ledger, members).unwrap();
    wrap_for_members(group_key, &recipients, rng)
        .unwrap()
        .into_iter()
        .map(MemberWrappedKey::from)
        .collect()
}

fn rejection(result: Result<Receipt, ProcessError>) -> ProtocolError {
    match result {
        Err(ProcessError::Rejected(err)) => err,
        other => panic!("expected rejection, got {other:?}"),
    }
}

/// Ledger with A and B registered and C registered but outside the group.
fn setup(rng: &mut ChaCha20Rng) -> (MemoryLedger, Party, Party, Party) {
    let ledger = MemoryLedger::default();
    let alice = party(0xa1, rng);
    let bob = party(0xb0, rng);
    let carol = party(0xc0, rng);
    for p in [&alice, &bob, &carol] {
        register(&ledger, p);
    }
    (ledger, alice, bob, carol)
}

#[test]
fn registration_is_idempotent_and_overwrites() {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let ledger = MemoryLedger::default();
    let alice = party(0xa1, &mut rng);

    register(&ledger, &alice);
    register(&ledger, &alice);

    let replacement = KemKeyPair::generate(&mut rng);
    let tx = Transaction::new(alice.identity, Instruction::Register {
        pq_public_key: replacement.public.to_base64(),
    });
    ledger.submit(&tx).unwrap();

    let registry = load_registry(&ledger, &alice.identity).unwrap().unwrap();
    assert_eq!(registry.pq_public_key, replacement.public.to_base64());
    assert_eq!(registry.updated_at_slot, 3);
    assert_eq!(ledger.account_count(), 1);
}

#[test]
fn create_by_member_succeeds_and_by_outsider_fails() {
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let (ledger, alice, bob, carol) = setup(&mut rng);
    let members = vec![alice.identity, bob.identity];
    let group_key = generate_group_key(&mut rng);
    let wrapped_keys = wrap(&ledger, &members, &group_key, &mut rng);

    let create = Instruction::CreateGroup {
        group_id: GROUP_ID,
        members: members.clone(),
        wrapped_keys: wrapped_keys.clone(),
    };

    let err = rejection(ledger.submit(&Transaction::new(carol.identity, create.clone())));
    assert_eq!(err, ProtocolError::CreatorNotMember);

    ledger.submit(&Transaction::new(alice.identity, create)).unwrap();

    let group = load_group(&ledger, &GROUP_ID).unwrap().unwrap();
    assert_eq!(group.members, members);
    assert_eq!(group.key_version, 0);
    assert_eq!(load_counter(&ledger, &GROUP_ID).unwrap().unwrap().next_id, 0);

    // Each member recovers the same key from the ledger copy
    for p in [&alice, &bob] {
        let wrapped = wrapped_key_for(&ledger, &GROUP_ID, &p.identity).unwrap().unwrap();
        assert_eq!(unwrap_group_key(&wrapped, &p.keys.private).unwrap(), group_key);
    }
    assert_eq!(wrapped_key_for(&ledger, &GROUP_ID, &carol.identity).unwrap(), None);
}

#[test]
fn rotate_then_send_gates_on_key_version() {
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let (ledger, alice, bob, carol) = setup(&mut rng);
    let members = vec![alice.identity, bob.identity];

    let first_key = generate_group_key(&mut rng);
    let wrapped_keys = wrap(&ledger, &members, &first_key, &mut rng);
    ledger
        .submit(&Transaction::new(alice.identity, Instruction::CreateGroup {
            group_id: GROUP_ID,
            members: members.clone(),
            wrapped_keys,
        }))
        .unwrap();

    // Rotation 0 -> 1
    let second_key = generate_group_key(&mut rng);
    let rotated = wrap(&ledger, &members, &second_key, &mut rng);

    let err = rejection(ledger.submit(&Transaction::new(carol.identity, Instruction::RotateGroupKey {
        group_id: GROUP_ID,
        wrapped_keys: rotated.clone(),
    })));
    assert_eq!(err, ProtocolError::NotGroupMember);

    let receipt = ledger
        .submit(&Transaction::new(alice.identity, Instruction::RotateGroupKey {
            group_id: GROUP_ID,
            wrapped_keys: rotated,
        }))
        .unwrap();
    assert!(matches!(receipt, Receipt::GroupKeyRotated { key_version: 1, .. }));

    // Send under version 1
    let sealed = encrypt_group_message(b"hello group", &second_key, GROUP_ID.as_bytes(), 1, &mut rng);
    let receipt = ledger
        .submit(&Transaction::new(alice.identity, Instruction::SendGroupMessage {
            group_id: GROUP_ID,
            key_version: 1,
            ciphertext: sealed.ciphertext.clone(),
            nonce: sealed.nonce.to_vec(),
        }))
        .unwrap();
    assert!(matches!(receipt, Receipt::MessageSent { msg_id: 0, .. }));
    assert_eq!(load_counter(&ledger, &GROUP_ID).unwrap().unwrap().next_id, 1);

    // Stale version 0 is refused and changes nothing
    let before = ledger.snapshot();
    let stale = encrypt_group_message(b"old key", &first_key, GROUP_ID.as_bytes(), 0, &mut rng);
    let err = rejection(ledger.submit(&Transaction::new(alice.identity, Instruction::SendGroupMessage {
        group_id: GROUP_ID,
        key_version: 0,
        ciphertext: stale.ciphertext,
        nonce: stale.nonce.to_vec(),
    })));
    assert_eq!(err, ProtocolError::KeyVersionMismatch { expected: 1, actual: 0 });
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert_eq!(ledger.snapshot(), before);

    // Bob reads it back with his own unwrapped copy
    let wrapped = wrapped_key_for(&ledger, &GROUP_ID, &bob.identity).unwrap().unwrap();
    let bob_key = unwrap_group_key(&wrapped, &bob.keys.private).unwrap();
    let page = load_messages(&ledger, &GROUP_ID, 0, 10).unwrap();
    assert_eq!(page.messages.len(), 1);
    assert!(!page.has_more);

    let message = &page.messages[0];
    assert_eq!(message.sender, alice.identity);
    let plaintext = decrypt_group_message(
        &message.ciphertext,
        &message.nonce,
        &bob_key,
        GROUP_ID.as_bytes(),
        message.key_version,
    )
    .unwrap();
    assert_eq!(plaintext, b"hello group");
}

#[test]
fn ciphertext_limit_is_inclusive() {
    let mut rng = ChaCha20Rng::seed_from_u64(4);
    let (ledger, alice, bob, _carol) = setup(&mut rng);
    let members = vec![alice.identity, bob.identity];
    let group_key = generate_group_key(&mut rng);
    let wrapped_keys = wrap(&ledger, &members, &group_key, &mut rng);
    ledger
        .submit(&Transaction::new(alice.identity, Instruction::CreateGroup {
            group_id: GROUP_ID,
            members,
            wrapped_keys,
        }))
        .unwrap();

    let max = ProtocolConfig::default().max_ciphertext_bytes;
    let send = |len: usize| {
        ledger.submit(&Transaction::new(bob.identity, Instruction::SendGroupMessage {
            group_id: GROUP_ID,
            key_version: 0,
            ciphertext: vec![0x5a; len],
            nonce: vec![0; 24],
        }))
    };

    let err = rejection(send(max + 1));
    assert_eq!(err, ProtocolError::CiphertextTooLong { len: max + 1, max });

    assert!(matches!(send(max), Ok(Receipt::MessageSent { msg_id: 0, .. })));
}

#[test]
fn founder_cannot_wrap_for_unregistered_member() {
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let ledger = MemoryLedger::default();
    let alice = party(0xa1, &mut rng);
    register(&ledger, &alice);

    let stranger = Identity::from_bytes([0x55; 32]);
    let recipients = member_recipients(&ledger, &[alice.identity, stranger]).unwrap();
    let result = wrap_for_members(&generate_group_key(&mut rng), &recipients, &mut rng);

    assert_eq!(result, Err(pqrelay_crypto::CryptoError::MemberKeyUnavailable { index: 1 }));
}
