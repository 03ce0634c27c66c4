//! Authenticated symmetric encryption using `XChaCha20-Poly1305`
//!
//! A fresh 24-byte random nonce is drawn from the caller's RNG on every
//! encryption. The extended nonce makes random collisions under one key
//! negligible, so no nonce state is kept between calls.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// `XChaCha20` nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// A 32-byte AEAD key. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    key: [u8; 32],
}

impl SymmetricKey {
    /// Use raw bytes as a key.
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive a key from a KEM shared secret.
    ///
    /// HKDF-SHA256 with no salt. `label` separates keys derived for
    /// different purposes from the same secret.
    pub fn derive(shared_secret: &[u8], label: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, shared_secret);

        let mut key = [0u8; 32];
        let Ok(()) = hkdf.expand(label, &mut key) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };

        Self { key }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Ciphertext and the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// Ciphertext including the 16-byte Poly1305 tag
    pub ciphertext: Vec<u8>,
    /// Random nonce used for this payload
    pub nonce: [u8; NONCE_SIZE],
}

impl SealedPayload {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn symmetric_encrypt<R: RngCore + CryptoRng>(
    key: &SymmetricKey,
    plaintext: &[u8],
    rng: &mut R,
) -> SealedPayload {
    seal(key, plaintext, &[], rng)
}

/// Decrypt and authenticate `ciphertext`.
///
/// # Errors
///
/// - `InvalidNonceLength`: `nonce` is not 24 bytes
/// - `AuthenticationFailed`: tag mismatch (wrong key or tampered data)
pub fn symmetric_decrypt(
    key: &SymmetricKey,
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    open(key, ciphertext, nonce, &[])
}

pub(crate) fn seal<R: RngCore + CryptoRng>(
    key: &SymmetricKey,
    plaintext: &[u8],
    aad: &[u8],
    rng: &mut R,
) -> SealedPayload {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    debug_assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);

    SealedPayload { ciphertext, nonce }
}

pub(crate) fn open(
    key: &SymmetricKey,
    ciphertext: &[u8],
    nonce: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidNonceLength { expected: NONCE_SIZE, actual: nonce.len() });
    }

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthenticationFailed)
}
