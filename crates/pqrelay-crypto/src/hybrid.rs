//! Hybrid encryption to a single recipient
//!
//! The output buffer is split purely by fixed offsets:
//!
//! ```text
//! 0            1088          1112
//! ├─ KEM ct ───┼─ nonce ─────┼─ AEAD ciphertext (plaintext + 16-byte tag) ─┤
//! ```
//!
//! No length prefix is needed because the encapsulated secret and nonce
//! lengths are protocol constants.

use rand::{CryptoRng, RngCore};

use crate::{
    error::CryptoError,
    kem::{KEM_CIPHERTEXT_SIZE, KemPrivateKey, KemPublicKey, decapsulate, encapsulate},
    symmetric::{NONCE_SIZE, SymmetricKey, TAG_SIZE, open, seal},
};

/// HKDF label for the AEAD key derived from a KEM shared secret
const HYBRID_KEY_LABEL: &[u8] = b"pqrelayHybridV1";

/// Length of the fixed prefix: encapsulated secret followed by nonce
pub const HYBRID_PREFIX_SIZE: usize = KEM_CIPHERTEXT_SIZE + NONCE_SIZE;

/// Bytes added to a plaintext by [`encrypt_for_recipient`]
pub const HYBRID_OVERHEAD: usize = HYBRID_PREFIX_SIZE + TAG_SIZE;

/// A message encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridCiphertext {
    /// `kem_ciphertext || nonce || aead_ciphertext`
    pub ciphertext: Vec<u8>,
    /// Copy of the embedded nonce
    pub nonce: [u8; NONCE_SIZE],
}

/// Encrypt `message` so only the holder of `recipient`'s private key can
/// read it.
///
/// # Errors
///
/// - `InvalidKeyFormat`: the public key is malformed
pub fn encrypt_for_recipient<R: RngCore + CryptoRng>(
    message: &[u8],
    recipient: &KemPublicKey,
    rng: &mut R,
) -> Result<HybridCiphertext, CryptoError> {
    let encapsulation = encapsulate(recipient, rng)?;
    let key = SymmetricKey::derive(encapsulation.shared_secret.as_bytes(), HYBRID_KEY_LABEL);
    let sealed = seal(&key, message, &[], rng);

    let mut ciphertext = Vec::with_capacity(HYBRID_OVERHEAD + message.len());
    ciphertext.extend_from_slice(&encapsulation.ciphertext);
    ciphertext.extend_from_slice(&sealed.nonce);
    ciphertext.extend_from_slice(&sealed.ciphertext);

    debug_assert_eq!(ciphertext.len(), HYBRID_OVERHEAD + message.len());

    Ok(HybridCiphertext { ciphertext, nonce: sealed.nonce })
}

/// Decrypt a buffer produced by [`encrypt_for_recipient`].
///
/// # Errors
///
/// - `TruncatedCiphertext`: shorter than the fixed prefix
/// - `AuthenticationFailed`: wrong key, or any byte was modified
pub fn decrypt_from_sender(
    ciphertext: &[u8],
    private_key: &KemPrivateKey,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < HYBRID_PREFIX_SIZE {
        return Err(CryptoError::TruncatedCiphertext {
            minimum: HYBRID_PREFIX_SIZE,
            actual: ciphertext.len(),
        });
    }

    let (kem_ciphertext, rest) = ciphertext.split_at(KEM_CIPHERTEXT_SIZE);
    let (nonce, body) = rest.split_at(NONCE_SIZE);

    let shared_secret = decapsulate(kem_ciphertext, private_key)?;
    let key = SymmetricKey::derive(shared_secret.as_bytes(), HYBRID_KEY_LABEL);

    open(&key, body, nonce, &[])
}
