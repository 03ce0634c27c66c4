//! ML-KEM-768 key encapsulation
//!
//! Keys travel as raw bytes (or standard base64 text in the registry) and are
//! only parsed into `ml-kem` types at the point of use. Length is the only
//! structural check the scheme allows on either key.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use ml_kem::{
    Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem768,
    kem::{Decapsulate, Encapsulate},
};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::error::CryptoError;

type DecapsulationKey = <MlKem768 as KemCore>::DecapsulationKey;
type EncapsulationKey = <MlKem768 as KemCore>::EncapsulationKey;

/// ML-KEM-768 encapsulation (public) key size
pub const KEM_PUBLIC_KEY_SIZE: usize = 1184;

/// ML-KEM-768 decapsulation (private) key size
pub const KEM_PRIVATE_KEY_SIZE: usize = 2400;

/// ML-KEM-768 encapsulated secret size
pub const KEM_CIPHERTEXT_SIZE: usize = 1088;

/// ML-KEM-768 shared secret size
pub const KEM_SHARED_SECRET_SIZE: usize = 32;

/// A member's public encapsulation key.
#[derive(Clone, PartialEq, Eq)]
pub struct KemPublicKey {
    bytes: Vec<u8>,
}

impl KemPublicKey {
    /// Wrap raw key bytes, checking the fixed length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEM_PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyFormat {
                kind: "public",
                expected: KEM_PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes: bytes.to_vec() })
    }

    /// Parse the base64 text form stored in the registry.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::InvalidEncoding { reason: e.to_string() })?;
        Self::from_bytes(&bytes)
    }

    /// Base64 text form, as registered on the ledger.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_encapsulation_key(&self) -> Result<EncapsulationKey, CryptoError> {
        let encoded = Encoded::<EncapsulationKey>::try_from(self.bytes.as_slice()).map_err(|_| {
            CryptoError::InvalidKeyFormat {
                kind: "public",
                expected: KEM_PUBLIC_KEY_SIZE,
                actual: self.bytes.len(),
            }
        })?;
        Ok(EncapsulationKey::from_bytes(&encoded))
    }
}

impl std::fmt::Debug for KemPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.bytes.iter().take(4).map(|b| format!("{b:02x}")).collect();
        write!(f, "KemPublicKey({prefix}..)")
    }
}

/// A member's private decapsulation key. Zeroized on drop.
#[derive(Clone)]
pub struct KemPrivateKey {
    bytes: Vec<u8>,
}

impl KemPrivateKey {
    /// Wrap raw key bytes, checking the fixed length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEM_PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidKeyFormat {
                kind: "private",
                expected: KEM_PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes: bytes.to_vec() })
    }

    /// Parse a base64-encoded private key.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let mut bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::InvalidEncoding { reason: e.to_string() })?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Base64 text form for local key storage.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this exposes the raw key material.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_decapsulation_key(&self) -> Result<DecapsulationKey, CryptoError> {
        let encoded = Encoded::<DecapsulationKey>::try_from(self.bytes.as_slice()).map_err(|_| {
            CryptoError::InvalidKeyFormat {
                kind: "private",
                expected: KEM_PRIVATE_KEY_SIZE,
                actual: self.bytes.len(),
            }
        })?;
        Ok(DecapsulationKey::from_bytes(&encoded))
    }
}

impl Drop for KemPrivateKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for KemPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KemPrivateKey([REDACTED])")
    }
}

/// An ML-KEM-768 key pair.
#[derive(Debug, Clone)]
pub struct KemKeyPair {
    /// Public half, published in the registry
    pub public: KemPublicKey,
    /// Private half, kept on the owner's device
    pub private: KemPrivateKey,
}

impl KemKeyPair {
    /// Generate a fresh key pair from the caller's CSPRNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let (dk, ek) = MlKem768::generate(rng);
        Self {
            public: KemPublicKey { bytes: ek.as_bytes().to_vec() },
            private: KemPrivateKey { bytes: dk.as_bytes().to_vec() },
        }
    }
}

/// A 32-byte KEM shared secret. Zeroized on drop.
pub struct SharedSecret {
    bytes: [u8; KEM_SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; KEM_SHARED_SECRET_SIZE] {
        &self.bytes
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Output of [`encapsulate`].
#[derive(Debug)]
pub struct Encapsulation {
    /// Encapsulated secret, sent to the recipient
    pub ciphertext: Vec<u8>,
    /// Shared secret, kept by the sender
    pub shared_secret: SharedSecret,
}

/// Encapsulate a fresh shared secret to `recipient`.
///
/// # Errors
///
/// - `InvalidKeyFormat`: the public key is not 1184 bytes
pub fn encapsulate<R: RngCore + CryptoRng>(
    recipient: &KemPublicKey,
    rng: &mut R,
) -> Result<Encapsulation, CryptoError> {
    let ek = recipient.to_encapsulation_key()?;

    let (ciphertext, shared) = ek.encapsulate(rng).map_err(|_| CryptoError::InvalidKeyFormat {
        kind: "public",
        expected: KEM_PUBLIC_KEY_SIZE,
        actual: recipient.bytes.len(),
    })?;

    let mut bytes = [0u8; KEM_SHARED_SECRET_SIZE];
    bytes.copy_from_slice(shared.as_slice());

    debug_assert_eq!(ciphertext.len(), KEM_CIPHERTEXT_SIZE);

    Ok(Encapsulation {
        ciphertext: ciphertext.as_slice().to_vec(),
        shared_secret: SharedSecret { bytes },
    })
}

/// Recover the shared secret from an encapsulated secret.
///
/// ML-KEM rejects implicitly: a ciphertext produced for a different key
/// yields an unrelated secret rather than an error, in constant time. The
/// AEAD layer above turns that into `AuthenticationFailed`.
///
/// # Errors
///
/// - `InvalidCiphertextLength`: `ciphertext` is not 1088 bytes
/// - `DecapsulationFailed`: the scheme reported a failure
pub fn decapsulate(
    ciphertext: &[u8],
    private_key: &KemPrivateKey,
) -> Result<SharedSecret, CryptoError> {
    if ciphertext.len() != KEM_CIPHERTEXT_SIZE {
        return Err(CryptoError::InvalidCiphertextLength {
            expected: KEM_CIPHERTEXT_SIZE,
            actual: ciphertext.len(),
        });
    }

    let encoded = Ciphertext::<MlKem768>::try_from(ciphertext).map_err(|_| {
        CryptoError::InvalidCiphertextLength {
            expected: KEM_CIPHERTEXT_SIZE,
            actual: ciphertext.len(),
        }
    })?;

    let dk = private_key.to_decapsulation_key()?;
    let shared = dk.decapsulate(&encoded).map_err(|_| CryptoError::DecapsulationFailed)?;

    let mut bytes = [0u8; KEM_SHARED_SECRET_SIZE];
    bytes.copy_from_slice(shared.as_slice());
    Ok(SharedSecret { bytes })
}
