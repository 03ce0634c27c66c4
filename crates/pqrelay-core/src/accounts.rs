//! Account records and their on-ledger byte encoding
//!
//! Each account blob is an 8-byte type discriminator followed by the
//! `bincode` encoding of the record (fixed-width little-endian integers,
//! u64 length prefixes). Decoding rejects a wrong discriminator, truncated
//! data and trailing bytes.
//!
//! Group counters and messages refer back to their group by [`Address`]
//! only. Nothing points from a group to its counter or messages; those are
//! found by deriving their addresses.

use bincode::Options;
use pqrelay_crypto::WrappedGroupKey;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};

use crate::{
    address::Address,
    error::HostError,
    identity::{GroupId, Identity},
};

/// Length of the type tag at the front of every account blob
pub const DISCRIMINATOR_SIZE: usize = 8;

/// Upper bound on an encoded account body, guarding against hostile length
/// prefixes
pub const MAX_ACCOUNT_BYTES: u64 = 64 * 1024;

/// Fixed-width parts of an encoded `GroupState`: id, two vec length
/// prefixes, key version and two slots
const GROUP_STATE_FIXED_BYTES: u64 = 32 + 8 + 8 + 8 + 8 + 8;

/// Per member: identity in `members`, plus identity and length prefix in
/// `wrapped_keys`
const GROUP_STATE_MEMBER_BYTES: u64 = 32 + 32 + 8;

/// Fixed-width parts of an encoded `GroupMessage`: group, sender, id,
/// version, two vec length prefixes and slot
const GROUP_MESSAGE_FIXED_BYTES: u64 = 32 + 32 + 8 + 8 + 8 + 8 + 8;

/// Encoded body size of a `GroupState` with `members` members whose wrapped
/// keys are `wrapped_key_bytes` long.
pub fn group_state_body_bytes(members: usize, wrapped_key_bytes: usize) -> u64 {
    let per_member = GROUP_STATE_MEMBER_BYTES.saturating_add(wrapped_key_bytes as u64);
    GROUP_STATE_FIXED_BYTES.saturating_add((members as u64).saturating_mul(per_member))
}

/// Encoded body size of a `GroupMessage` with the given field lengths.
pub fn group_message_body_bytes(ciphertext_bytes: usize, nonce_bytes: usize) -> u64 {
    GROUP_MESSAGE_FIXED_BYTES
        .saturating_add(ciphertext_bytes as u64)
        .saturating_add(nonce_bytes as u64)
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
        .with_limit(MAX_ACCOUNT_BYTES)
}

/// A record stored in its own ledger account.
pub trait AccountData: Serialize + DeserializeOwned {
    /// Type name hashed into the discriminator
    const NAME: &'static str;

    /// First 8 bytes of `SHA-256("account:<NAME>")`.
    fn discriminator() -> [u8; DISCRIMINATOR_SIZE] {
        let digest = Sha256::digest(format!("account:{}", Self::NAME).as_bytes());
        let mut tag = [0u8; DISCRIMINATOR_SIZE];
        tag.copy_from_slice(&digest[..DISCRIMINATOR_SIZE]);
        tag
    }

    /// Encode as an account blob.
    fn to_account_bytes(&self) -> Result<Vec<u8>, HostError> {
        let body = codec().serialize(self).map_err(|e| HostError::Codec(e.to_string()))?;

        let mut bytes = Vec::with_capacity(DISCRIMINATOR_SIZE + body.len());
        bytes.extend_from_slice(&Self::discriminator());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decode the account blob stored at `address`.
    fn from_account_bytes(address: &Address, bytes: &[u8]) -> Result<Self, HostError> {
        let corrupt = |reason: String| HostError::CorruptAccount { address: *address, reason };

        let Some((tag, body)) = bytes.split_first_chunk::<DISCRIMINATOR_SIZE>() else {
            return Err(corrupt(format!("{} bytes is shorter than the discriminator", bytes.len())));
        };

        if *tag != Self::discriminator() {
            return Err(corrupt(format!("discriminator is not {}", Self::NAME)));
        }

        codec().deserialize(body).map_err(|e| corrupt(e.to_string()))
    }
}

/// One owner's registered encapsulation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Identity that registered the key
    pub owner: Identity,
    /// Base64-encoded ML-KEM-768 public key
    pub pq_public_key: String,
    /// Slot of the most recent registration
    pub updated_at_slot: u64,
}

impl AccountData for Registry {
    const NAME: &'static str = "Registry";
}

/// The group key as wrapped for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberWrappedKey {
    /// Member the key is wrapped for
    pub member: Identity,
    /// Hybrid ciphertext of the group key
    pub wrapped_key: Vec<u8>,
}

impl From<WrappedGroupKey<Identity>> for MemberWrappedKey {
    fn from(wrapped: WrappedGroupKey<Identity>) -> Self {
        Self { member: wrapped.identity, wrapped_key: wrapped.wrapped_key }
    }
}

/// Membership and current key material of a group.
///
/// Invariants (enforced by the processor on every write):
/// - `members` is non-empty, unique, and within the configured maximum
/// - `wrapped_keys` holds exactly one entry per member and none for
///   non-members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    /// Caller-chosen group id
    pub group_id: GroupId,
    /// Members in creation order
    pub members: Vec<Identity>,
    /// Generation of the group key; incremented by every rotation
    pub key_version: u64,
    /// Current group key, wrapped once per member
    pub wrapped_keys: Vec<MemberWrappedKey>,
    /// Slot the group was created at
    pub created_at_slot: u64,
    /// Slot of the last creation or rotation
    pub updated_at_slot: u64,
}

impl GroupState {
    /// Whether `identity` is a member.
    pub fn is_member(&self, identity: &Identity) -> bool {
        self.members.contains(identity)
    }

    /// The wrapped group key for `member`, if any.
    pub fn wrapped_key_for(&self, member: &Identity) -> Option<&[u8]> {
        self.wrapped_keys
            .iter()
            .find(|entry| entry.member == *member)
            .map(|entry| entry.wrapped_key.as_slice())
    }
}

impl AccountData for GroupState {
    const NAME: &'static str = "GroupState";
}

/// Per-group message id allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounter {
    /// Address of the owning group
    pub group: Address,
    /// Id the next accepted message receives
    pub next_id: u64,
}

impl AccountData for GroupCounter {
    const NAME: &'static str = "GroupCounter";
}

/// An encrypted message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessage {
    /// Address of the owning group
    pub group: Address,
    /// Member that sent the message
    pub sender: Identity,
    /// Position in the group's message sequence
    pub msg_id: u64,
    /// Key version the message was encrypted under
    pub key_version: u64,
    /// AEAD ciphertext
    pub ciphertext: Vec<u8>,
    /// AEAD nonce
    pub nonce: Vec<u8>,
    /// Slot the message was accepted at
    pub created_at_slot: u64,
}

impl AccountData for GroupMessage {
    const NAME: &'static str = "GroupMessage";
}
