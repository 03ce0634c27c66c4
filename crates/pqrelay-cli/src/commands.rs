//! File-based key generation and one-shot encryption

use std::{
    fs,
    path::{Path, PathBuf},
};

use pqrelay_crypto::{KemKeyPair, KemPrivateKey, KemPublicKey, decrypt_from_sender, encrypt_for_recipient};
use rand::{CryptoRng, RngCore};

use crate::error::CliError;

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map(|s| s.trim().to_owned()).map_err(|e| CliError::io(path, e))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|e| CliError::io(path, e))
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    fs::write(path, bytes).map_err(|e| CliError::io(path, e))
}

/// Write `<name>.pub` and `<name>.key` into `out_dir`, returning both paths.
pub fn keygen<R: RngCore + CryptoRng>(
    name: &str,
    out_dir: &Path,
    rng: &mut R,
) -> Result<(PathBuf, PathBuf), CliError> {
    fs::create_dir_all(out_dir).map_err(|e| CliError::io(out_dir, e))?;

    let pair = KemKeyPair::generate(rng);
    let public = out_dir.join(format!("{name}.pub"));
    let private = out_dir.join(format!("{name}.key"));

    write_bytes(&public, pair.public.to_base64().as_bytes())?;
    write_bytes(&private, pair.private.to_base64().as_bytes())?;

    Ok((public, private))
}

/// Encrypt `input` for the key in `recipient`; returns bytes written.
pub fn encrypt_file<R: RngCore + CryptoRng>(
    recipient: &Path,
    input: &Path,
    output: &Path,
    rng: &mut R,
) -> Result<usize, CliError> {
    let public = KemPublicKey::from_base64(&read_text(recipient)?)?;
    let plaintext = read_bytes(input)?;

    let encrypted = encrypt_for_recipient(&plaintext, &public, rng)?;
    write_bytes(output, &encrypted.ciphertext)?;

    Ok(encrypted.ciphertext.len())
}

/// Decrypt `input` with the key in `key`; returns bytes written.
pub fn decrypt_file(key: &Path, input: &Path, output: &Path) -> Result<usize, CliError> {
    let private = KemPrivateKey::from_base64(&read_text(key)?)?;
    let ciphertext = read_bytes(input)?;

    let plaintext = decrypt_from_sender(&ciphertext, &private)?;
    write_bytes(output, &plaintext)?;

    Ok(plaintext.len())
}
