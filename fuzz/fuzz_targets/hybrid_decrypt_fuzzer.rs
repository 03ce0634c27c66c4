//! Fuzz target for hybrid decryption and group key unwrapping
//!
//! # Strategy
//!
//! - Raw bytes: arbitrary buffers fed to `decrypt_from_sender`
//! - Mutated: a genuine ciphertext with arbitrary byte edits, truncation or
//!   extension
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - Buffers shorter than the fixed prefix fail with `TruncatedCiphertext`
//! - Any modification of a genuine ciphertext fails authentication
//! - An unmodified ciphertext always decrypts to the original plaintext

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pqrelay_crypto::{
    CryptoError, HYBRID_PREFIX_SIZE, KemKeyPair, decrypt_from_sender, encrypt_for_recipient,
    unwrap_group_key,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

#[derive(Debug, Clone, Arbitrary)]
enum Input {
    RawBytes { bytes: Vec<u8> },
    Mutated { seed: u64, plaintext: Vec<u8>, edits: Vec<Edit> },
}

#[derive(Debug, Clone, Arbitrary)]
enum Edit {
    Xor { position: u16, mask: u8 },
    Truncate { keep: u16 },
    Append { bytes: Vec<u8> },
}

fuzz_target!(|input: Input| {
    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let pair = KemKeyPair::generate(&mut rng);

    match input {
        Input::RawBytes { bytes } => {
            let result = decrypt_from_sender(&bytes, &pair.private);
            if bytes.len() < HYBRID_PREFIX_SIZE {
                assert!(matches!(result, Err(CryptoError::TruncatedCiphertext { .. })));
            }
            let _ = unwrap_group_key(&bytes, &pair.private);
        },

        Input::Mutated { seed, plaintext, edits } => {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let Ok(encrypted) = encrypt_for_recipient(&plaintext, &pair.public, &mut rng) else {
                panic!("encryption to a valid key failed");
            };

            let mut buffer = encrypted.ciphertext.clone();
            for edit in edits {
                match edit {
                    Edit::Xor { position, mask } => {
                        if !buffer.is_empty() {
                            let index = usize::from(position) % buffer.len();
                            buffer[index] ^= mask;
                        }
                    },
                    Edit::Truncate { keep } => buffer.truncate(usize::from(keep)),
                    Edit::Append { bytes } => buffer.extend_from_slice(&bytes),
                }
            }

            let result = decrypt_from_sender(&buffer, &pair.private);
            if buffer == encrypted.ciphertext {
                assert_eq!(result, Ok(plaintext));
            } else {
                assert!(result.is_err(), "modified ciphertext decrypted");
            }
        },
    }
});
