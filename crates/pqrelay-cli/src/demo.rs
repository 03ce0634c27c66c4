//! Scripted group session on an in-memory ledger
//!
//! Registers `members` parties, creates a group founded by the first,
//! rotates the key `rotations` times, sends `messages` round-robin, then has
//! every member read and decrypt the full history.

use pqrelay_core::{
    GroupId, Identity, Instruction, Ledger, MemberWrappedKey, MemoryLedger, ProtocolConfig,
    Receipt, Transaction, load_group, load_messages, member_recipients, wrapped_key_for,
};
use pqrelay_crypto::{
    GroupKey, KemKeyPair, decrypt_group_message, encrypt_group_message, generate_group_key,
    unwrap_group_key, wrap_for_members,
};
use rand::{CryptoRng, RngCore};
use tracing::{debug, info};

use crate::error::CliError;

/// Page size used when reading history back
const PAGE_SIZE: usize = 4;

/// What the demo should do
#[derive(Debug, Clone)]
pub struct DemoPlan {
    /// Number of members
    pub members: u8,
    /// Messages to send
    pub messages: usize,
    /// Rotations before sending
    pub rotations: u64,
}

/// What the demo observed
#[derive(Debug, Clone)]
pub struct DemoSummary {
    /// Group that was created
    pub group_id: GroupId,
    /// Key version after all rotations
    pub key_version: u64,
    /// Messages each member decrypted
    pub messages_read: usize,
}

struct Member {
    identity: Identity,
    keys: KemKeyPair,
}

fn wrap_current<R: RngCore + CryptoRng>(
    ledger: &MemoryLedger,
    members: &[Identity],
    group_key: &GroupKey,
    rng: &mut R,
) -> Result<Vec<MemberWrappedKey>, CliError> {
    let recipients = member_recipients(ledger, members)?;
    Ok(wrap_for_members(group_key, &recipients, rng)?.into_iter().map(MemberWrappedKey::from).collect())
}

/// Run `plan` against a fresh ledger enforcing `config`.
pub fn run<R: RngCore + CryptoRng>(
    plan: &DemoPlan,
    config: ProtocolConfig,
    rng: &mut R,
) -> Result<DemoSummary, CliError> {
    let ledger = MemoryLedger::new(config)?;

    let members: Vec<Member> = (1..=plan.members)
        .map(|tag| {
            let mut id = [0u8; 32];
            rng.fill_bytes(&mut id);
            id[0] = tag;
            Member { identity: Identity::from_bytes(id), keys: KemKeyPair::generate(&mut *rng) }
        })
        .collect();
    let identities: Vec<Identity> = members.iter().map(|m| m.identity).collect();

    for member in &members {
        ledger.submit(&Transaction::new(member.identity, Instruction::Register {
            pq_public_key: member.keys.public.to_base64(),
        }))?;
    }
    info!(members = members.len(), "members registered");

    let mut raw_id = [0u8; 32];
    rng.fill_bytes(&mut raw_id);
    let group_id = GroupId::from_bytes(raw_id);

    let founder = identities.first().copied().ok_or(CliError::Demo("no members".to_owned()))?;
    let mut group_key = generate_group_key(rng);
    let receipt = ledger.submit(&Transaction::new(founder, Instruction::CreateGroup {
        group_id,
        members: identities.clone(),
        wrapped_keys: wrap_current(&ledger, &identities, &group_key, rng)?,
    }))?;
    let Receipt::GroupCreated { mut key_version, .. } = receipt else {
        return Err(CliError::Demo(format!("unexpected receipt {receipt:?}")));
    };
    info!(group = %group_id, key_version, "group created");

    for round in 0..plan.rotations {
        let rotator = identities[(round as usize) % identities.len()];
        group_key = generate_group_key(rng);
        let receipt = ledger.submit(&Transaction::new(rotator, Instruction::RotateGroupKey {
            group_id,
            wrapped_keys: wrap_current(&ledger, &identities, &group_key, rng)?,
        }))?;
        let Receipt::GroupKeyRotated { key_version: rotated, .. } = receipt else {
            return Err(CliError::Demo(format!("unexpected receipt {receipt:?}")));
        };
        key_version = rotated;
        info!(key_version, "group key rotated");
    }

    let mut sent = Vec::with_capacity(plan.messages);
    for index in 0..plan.messages {
        let sender = identities[index % identities.len()];
        let text = format!("message {index} from {sender}");
        let sealed =
            encrypt_group_message(text.as_bytes(), &group_key, group_id.as_bytes(), key_version, rng);

        let receipt = ledger.submit(&Transaction::new(sender, Instruction::SendGroupMessage {
            group_id,
            key_version,
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce.to_vec(),
        }))?;
        debug!(?receipt, "message sent");
        sent.push(text.into_bytes());
    }

    let group = load_group(&ledger, &group_id)?
        .ok_or_else(|| CliError::Demo("group missing after creation".to_owned()))?;

    for member in &members {
        let wrapped = wrapped_key_for(&ledger, &group_id, &member.identity)?
            .ok_or_else(|| CliError::Demo(format!("no wrapped key for {}", member.identity)))?;
        let key = unwrap_group_key(&wrapped, &member.keys.private)?;

        let mut from = 0;
        loop {
            let page = load_messages(&ledger, &group_id, from, PAGE_SIZE)?;
            for message in &page.messages {
                let plaintext = decrypt_group_message(
                    &message.ciphertext,
                    &message.nonce,
                    &key,
                    group_id.as_bytes(),
                    message.key_version,
                )?;
                if sent.get(message.msg_id as usize) != Some(&plaintext) {
                    return Err(CliError::Demo(format!("message {} did not round-trip", message.msg_id)));
                }
            }
            from += page.messages.len() as u64;
            if !page.has_more {
                break;
            }
        }
        debug!(member = %member.identity, read = from, "history verified");
    }

    Ok(DemoSummary { group_id, key_version: group.key_version, messages_read: sent.len() })
}
