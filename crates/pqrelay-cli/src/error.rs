use std::path::PathBuf;

use pqrelay_core::{ConfigError, HostError, ProcessError};
use pqrelay_crypto::CryptoError;
use thiserror::Error;

/// Errors surfaced by CLI commands
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading or writing a file failed
    #[error("{path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Key parsing, encryption or decryption failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The requested limits cannot be enforced
    #[error("invalid limits: {0}")]
    Config(#[from] ConfigError),

    /// The ledger refused or failed a transaction
    #[error("ledger error: {0}")]
    Ledger(#[from] ProcessError),

    /// Reading ledger accounts failed
    #[error("ledger read error: {0}")]
    Host(#[from] HostError),

    /// The demo produced something other than what it submitted
    #[error("demo invariant violated: {0}")]
    Demo(String),
}

impl CliError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}
