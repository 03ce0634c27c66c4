//! Group key generation, per-member wrapping, and group message sealing
//!
//! A group key is wrapped once per member with [`encrypt_for_recipient`].
//! The wrapped bytes are exactly what the ledger stores in the group's
//! `wrapped_keys`, so the state machine's length limits apply to the
//! output of [`wrap_for_members`] unchanged.

use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    hybrid::{decrypt_from_sender, encrypt_for_recipient},
    kem::{KemPrivateKey, KemPublicKey},
    symmetric::{SealedPayload, SymmetricKey, open, seal},
};

/// Group key size (256-bit)
pub const GROUP_KEY_SIZE: usize = 32;

/// HKDF label separating message keys from the raw group key
const GROUP_MESSAGE_LABEL: &[u8] = b"pqrelayGroupMessageV1";

/// A group's symmetric key for one key version. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct GroupKey {
    key: [u8; GROUP_KEY_SIZE],
}

impl GroupKey {
    /// Use raw bytes as a group key.
    pub fn from_bytes(key: [u8; GROUP_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this exposes the raw key material.
    pub fn as_bytes(&self) -> &[u8; GROUP_KEY_SIZE] {
        &self.key
    }

    fn message_key(&self) -> SymmetricKey {
        SymmetricKey::derive(&self.key, GROUP_MESSAGE_LABEL)
    }
}

impl Drop for GroupKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GroupKey([REDACTED])")
    }
}

/// Generate a fresh uniformly random group key.
pub fn generate_group_key<R: RngCore + CryptoRng>(rng: &mut R) -> GroupKey {
    let mut key = [0u8; GROUP_KEY_SIZE];
    rng.fill_bytes(&mut key);
    GroupKey { key }
}

/// A member to wrap the group key for.
///
/// `public_key` is `None` when the member has no registry entry. Resolving
/// keys is the caller's job.
#[derive(Debug, Clone)]
pub struct MemberRecipient<I> {
    /// Member identity
    pub identity: I,
    /// Member's registered encapsulation key
    pub public_key: Option<KemPublicKey>,
}

/// The group key wrapped for one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedGroupKey<I> {
    /// Member identity
    pub identity: I,
    /// Hybrid ciphertext of the group key
    pub wrapped_key: Vec<u8>,
}

/// Wrap `group_key` for every member, in input order.
///
/// # Errors
///
/// - `MemberKeyUnavailable`: some member has no public key; nothing is
///   wrapped in that case
/// - `InvalidKeyFormat`: some member's public key is malformed
pub fn wrap_for_members<I: Clone, R: RngCore + CryptoRng>(
    group_key: &GroupKey,
    members: &[MemberRecipient<I>],
    rng: &mut R,
) -> Result<Vec<WrappedGroupKey<I>>, CryptoError> {
    if let Some(index) = members.iter().position(|m| m.public_key.is_none()) {
        return Err(CryptoError::MemberKeyUnavailable { index });
    }

    members
        .iter()
        .enumerate()
        .map(|(index, member)| {
            let public_key =
                member.public_key.as_ref().ok_or(CryptoError::MemberKeyUnavailable { index })?;
            let wrapped = encrypt_for_recipient(group_key.as_bytes(), public_key, rng)?;
            Ok(WrappedGroupKey { identity: member.identity.clone(), wrapped_key: wrapped.ciphertext })
        })
        .collect()
}

/// Recover the group key from this member's wrapped copy.
///
/// # Errors
///
/// - `TruncatedCiphertext` / `AuthenticationFailed`: not wrapped for this key
/// - `InvalidGroupKey`: decrypted payload is not 32 bytes
pub fn unwrap_group_key(
    wrapped_key: &[u8],
    private_key: &KemPrivateKey,
) -> Result<GroupKey, CryptoError> {
    let mut plaintext = decrypt_from_sender(wrapped_key, private_key)?;

    if plaintext.len() != GROUP_KEY_SIZE {
        let actual = plaintext.len();
        plaintext.zeroize();
        return Err(CryptoError::InvalidGroupKey { expected: GROUP_KEY_SIZE, actual });
    }

    let mut key = [0u8; GROUP_KEY_SIZE];
    key.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(GroupKey { key })
}

/// Associated data binding a message to its group and key version:
/// `group_id || key_version (big-endian)`.
fn message_aad(group_id: &[u8; 32], key_version: u64) -> [u8; 40] {
    let mut aad = [0u8; 40];
    aad[..32].copy_from_slice(group_id);
    aad[32..].copy_from_slice(&key_version.to_be_bytes());
    aad
}

/// Seal an application message under the group key.
///
/// The output's `ciphertext` and `nonce` go straight into a
/// `SendGroupMessage` instruction with the same `key_version`.
pub fn encrypt_group_message<R: RngCore + CryptoRng>(
    plaintext: &[u8],
    group_key: &GroupKey,
    group_id: &[u8; 32],
    key_version: u64,
    rng: &mut R,
) -> SealedPayload {
    seal(&group_key.message_key(), plaintext, &message_aad(group_id, key_version), rng)
}

/// Open an application message read back from the ledger.
///
/// # Errors
///
/// - `InvalidNonceLength`: `nonce` is not 24 bytes
/// - `AuthenticationFailed`: wrong key, wrong group/version, or tampering
pub fn decrypt_group_message(
    ciphertext: &[u8],
    nonce: &[u8],
    group_key: &GroupKey,
    group_id: &[u8; 32],
    key_version: u64,
) -> Result<Vec<u8>, CryptoError> {
    open(&group_key.message_key(), ciphertext, nonce, &message_aad(group_id, key_version))
}
