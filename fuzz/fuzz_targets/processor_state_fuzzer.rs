//! Fuzz target for the instruction processor
//!
//! Drives a `MemoryLedger` with arbitrary sequences of register, create,
//! rotate and send instructions from a small pool of identities.
//!
//! # Invariants
//!
//! - NEVER panic on any instruction sequence
//! - A rejected submission leaves every account byte-for-byte unchanged
//! - Message ids per group are exactly 0..N in acceptance order
//! - Accepted rotations bump the key version by exactly one
//! - Every stored group has one wrapped key per member, no extras

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pqrelay_core::{
    GroupId, Identity, Instruction, Ledger, MemberWrappedKey, MemoryLedger, Receipt, Transaction,
    load_group, load_messages,
};

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Register { signer: u8, key: String },
    Create { signer: u8, group: u8, members: Vec<u8>, wrapped: Vec<(u8, u16)> },
    Rotate { signer: u8, group: u8, wrapped: Vec<(u8, u16)> },
    Send { signer: u8, group: u8, key_version: u64, ciphertext_len: u16, nonce_len: u8 },
}

fn identity(tag: u8) -> Identity {
    Identity::from_bytes([tag % 6; 32])
}

fn group_id(tag: u8) -> GroupId {
    GroupId::from_bytes([tag % 3; 32])
}

fn wrapped_keys(entries: &[(u8, u16)]) -> Vec<MemberWrappedKey> {
    entries
        .iter()
        .map(|(member, len)| MemberWrappedKey {
            member: identity(*member),
            wrapped_key: vec![0xab; usize::from(*len % 1300)],
        })
        .collect()
}

fuzz_target!(|ops: Vec<Op>| {
    let ledger = MemoryLedger::default();
    let mut next_ids: HashMap<GroupId, u64> = HashMap::new();
    let mut versions: HashMap<GroupId, u64> = HashMap::new();

    for op in ops.into_iter().take(64) {
        let (tx, gid) = match op {
            Op::Register { signer, key } => (
                Transaction::new(identity(signer), Instruction::Register { pq_public_key: key }),
                None,
            ),
            Op::Create { signer, group, members, wrapped } => (
                Transaction::new(identity(signer), Instruction::CreateGroup {
                    group_id: group_id(group),
                    members: members.iter().map(|m| identity(*m)).collect(),
                    wrapped_keys: wrapped_keys(&wrapped),
                }),
                Some(group_id(group)),
            ),
            Op::Rotate { signer, group, wrapped } => (
                Transaction::new(identity(signer), Instruction::RotateGroupKey {
                    group_id: group_id(group),
                    wrapped_keys: wrapped_keys(&wrapped),
                }),
                Some(group_id(group)),
            ),
            Op::Send { signer, group, key_version, ciphertext_len, nonce_len } => (
                Transaction::new(identity(signer), Instruction::SendGroupMessage {
                    group_id: group_id(group),
                    key_version: key_version % 4,
                    ciphertext: vec![0xcd; usize::from(ciphertext_len % 1300)],
                    nonce: vec![0xef; usize::from(nonce_len % 80)],
                }),
                Some(group_id(group)),
            ),
        };

        let before = ledger.snapshot();
        match ledger.submit(&tx) {
            Ok(Receipt::GroupCreated { key_version, .. }) => {
                let Some(gid) = gid else { panic!("create receipt without group") };
                next_ids.insert(gid, 0);
                versions.insert(gid, key_version);
            },
            Ok(Receipt::GroupKeyRotated { key_version, .. }) => {
                let Some(gid) = gid else { panic!("rotate receipt without group") };
                let previous = versions.insert(gid, key_version);
                assert_eq!(previous.map(|v| v + 1), Some(key_version));
            },
            Ok(Receipt::MessageSent { msg_id, .. }) => {
                let Some(gid) = gid else { panic!("send receipt without group") };
                let expected = next_ids.entry(gid).or_insert(0);
                assert_eq!(msg_id, *expected);
                *expected += 1;
            },
            Ok(Receipt::Registered { .. }) => {},
            Err(_) => assert_eq!(ledger.snapshot(), before, "rejection mutated state"),
        }
    }

    for (gid, count) in &next_ids {
        let Ok(Some(group)) = load_group(&ledger, gid) else {
            panic!("created group missing");
        };
        assert_eq!(group.wrapped_keys.len(), group.members.len());
        for member in &group.members {
            assert_eq!(group.wrapped_keys.iter().filter(|w| w.member == *member).count(), 1);
        }

        let Ok(page) = load_messages(&ledger, gid, 0, usize::MAX) else {
            panic!("message history unreadable");
        };
        assert_eq!(page.messages.len() as u64, *count);
        for (index, message) in page.messages.iter().enumerate() {
            assert_eq!(message.msg_id, index as u64);
        }
    }
});
