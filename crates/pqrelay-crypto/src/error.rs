//! Error types for cryptographic operations

use thiserror::Error;

/// Errors from key encapsulation, symmetric encryption and key wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key bytes do not have the fixed length of the scheme
    #[error("invalid {kind} key format: expected {expected} bytes, got {actual}")]
    InvalidKeyFormat {
        /// Which key was malformed ("public" or "private")
        kind: &'static str,
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// Key text is not valid base64
    #[error("invalid key encoding: {reason}")]
    InvalidEncoding {
        /// Decoder error message
        reason: String,
    },

    /// Encapsulated secret does not have the scheme's fixed length
    #[error("invalid encapsulated secret length: expected {expected} bytes, got {actual}")]
    InvalidCiphertextLength {
        /// Expected ciphertext length
        expected: usize,
        /// Actual ciphertext length
        actual: usize,
    },

    /// Nonce does not have the cipher's fixed length
    #[error("invalid nonce length: expected {expected} bytes, got {actual}")]
    InvalidNonceLength {
        /// Expected nonce length
        expected: usize,
        /// Actual nonce length
        actual: usize,
    },

    /// Decapsulation could not produce a shared secret
    #[error("decapsulation failed")]
    DecapsulationFailed,

    /// AEAD tag did not verify: payload is corrupted or forged
    #[error("authentication failed: ciphertext is corrupted or forged")]
    AuthenticationFailed,

    /// Hybrid buffer is shorter than the fixed-length prefix
    #[error("truncated ciphertext: need at least {minimum} bytes, got {actual}")]
    TruncatedCiphertext {
        /// Minimum buffer length
        minimum: usize,
        /// Actual buffer length
        actual: usize,
    },

    /// A member has no registered public key
    #[error("member at position {index} has no registered public key")]
    MemberKeyUnavailable {
        /// Position of the member in the input list
        index: usize,
    },

    /// Unwrapped payload is not a group key
    #[error("invalid group key length: expected {expected} bytes, got {actual}")]
    InvalidGroupKey {
        /// Expected key length
        expected: usize,
        /// Actual payload length
        actual: usize,
    },
}

impl CryptoError {
    /// Returns true if this error means "cannot decrypt".
    ///
    /// Callers surface these to the user as an undecryptable message. They
    /// must never fall back to treating the payload as plaintext.
    pub fn is_decryption_failure(&self) -> bool {
        match self {
            Self::DecapsulationFailed
            | Self::AuthenticationFailed
            | Self::TruncatedCiphertext { .. }
            | Self::InvalidCiphertextLength { .. }
            | Self::InvalidNonceLength { .. }
            | Self::InvalidGroupKey { .. } => true,

            Self::InvalidKeyFormat { .. }
            | Self::InvalidEncoding { .. }
            | Self::MemberKeyUnavailable { .. } => false,
        }
    }
}
