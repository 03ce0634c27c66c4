//! pqrelay Cryptographic Primitives
//!
//! Client-side building blocks for pqrelay. Pure functions over byte buffers
//! with no ledger or network access. Every operation that needs randomness
//! takes the RNG from the caller, so tests can run against a seeded generator
//! while production passes `rand::rngs::OsRng`.
//!
//! # Key Lifecycle
//!
//! Each party owns one ML-KEM-768 key pair and publishes the public half in
//! the registry. A group has one 32-byte symmetric key per key version, and
//! every member receives an individually encapsulated copy of it.
//!
//! ```text
//! GroupKey (32 random bytes, per key version)
//!        │
//!        ▼ encrypt_for_recipient (once per member)
//! ML-KEM-768 encapsulate → shared secret
//!        │
//!        ▼ HKDF-SHA256
//! XChaCha20-Poly1305 key
//!        │
//!        ▼
//! WrappedKey = kem_ciphertext || nonce || aead(group key)
//! ```
//!
//! Application messages are then sealed directly under the group key with
//! [`encrypt_group_message`]. The associated data binds each ciphertext to
//! its group and key version.
//!
//! # Security
//!
//! Confidentiality:
//! - ML-KEM-768 protects the group key against quantum adversaries
//! - Fresh encapsulation and a fresh random nonce per call
//! - Group keys come from the caller's CSPRNG, never from group metadata
//!
//! Authenticity:
//! - XChaCha20-Poly1305 tags cover every wrapped key and message
//! - Flipping any bit of a wrapped key (including the KEM ciphertext) fails
//!   authentication, since ML-KEM decapsulation implicitly rejects
//! - Failed authentication tag -> reject, never fall back to plaintext
//!
//! Key hygiene:
//! - Private keys, group keys and derived AEAD keys are zeroized on drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod group_key;
pub mod hybrid;
pub mod kem;
pub mod symmetric;

pub use error::CryptoError;
pub use group_key::{
    GROUP_KEY_SIZE, GroupKey, MemberRecipient, WrappedGroupKey,
    decrypt_group_message, encrypt_group_message, generate_group_key, unwrap_group_key,
    wrap_for_members,
};
pub use hybrid::{
    HYBRID_OVERHEAD, HYBRID_PREFIX_SIZE, HybridCiphertext, decrypt_from_sender,
    encrypt_for_recipient,
};
pub use kem::{
    Encapsulation, KEM_CIPHERTEXT_SIZE, KEM_PRIVATE_KEY_SIZE, KEM_PUBLIC_KEY_SIZE,
    KEM_SHARED_SECRET_SIZE, KemKeyPair, KemPrivateKey, KemPublicKey, SharedSecret, decapsulate,
    encapsulate,
};
pub use symmetric::{
    NONCE_SIZE, SealedPayload, SymmetricKey, TAG_SIZE, symmetric_decrypt, symmetric_encrypt,
};
