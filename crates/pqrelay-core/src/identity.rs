//! Fixed-width identifiers: signer identities and group ids

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width of an identity key in bytes (the host ledger's public-key width)
pub const IDENTITY_SIZE: usize = 32;

/// Width of a group id in bytes
pub const GROUP_ID_SIZE: usize = 32;

/// A party's identity key on the host ledger.
///
/// The host verifies signatures; the core only compares identities.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity([u8; IDENTITY_SIZE]);

impl Identity {
    /// Wrap raw identity bytes.
    pub const fn from_bytes(bytes: [u8; IDENTITY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw identity bytes.
    pub const fn as_bytes(&self) -> &[u8; IDENTITY_SIZE] {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({}..)", hex::encode(&self.0[..4]))
    }
}

/// Caller-chosen opaque group identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId([u8; GROUP_ID_SIZE]);

impl GroupId {
    /// Wrap raw group id bytes.
    pub const fn from_bytes(bytes: [u8; GROUP_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw group id bytes.
    pub const fn as_bytes(&self) -> &[u8; GROUP_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({}..)", hex::encode(&self.0[..4]))
    }
}
