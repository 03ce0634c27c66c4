//! Error types for the pqrelay state machine.
//!
//! Rejections ([`ProtocolError`]) are ordinary return values: the instruction
//! is refused and no account changes. Host faults ([`HostError`]) come from
//! the environment (storage I/O, corrupt account bytes) and are surfaced
//! upward unresolved.

use thiserror::Error;

use crate::address::Address;

/// Error taxonomy for rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed key or out-of-bounds field
    Format,
    /// Arguments disagree with current account state
    Consistency,
    /// Counter or version overflow
    Arithmetic,
}

/// Reasons an instruction is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Registry public key is empty, too long, or not a valid encapsulation key
    #[error("invalid public key format: {reason}")]
    InvalidPublicKeyFormat {
        /// What was wrong with the key
        reason: String,
    },

    /// `members` is empty
    #[error("no members provided")]
    NoMembers,

    /// `members` exceeds the configured maximum
    #[error("too many members: {count} exceeds maximum {max}")]
    TooManyMembers {
        /// Number of members supplied
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// The signer creating a group is not in `members`
    #[error("creator must be a member")]
    CreatorNotMember,

    /// Instruction's group id differs from the stored one
    #[error("group id mismatch")]
    GroupIdMismatch,

    /// Signer is not a member of the group
    #[error("signer is not a group member")]
    NotGroupMember,

    /// `wrapped_keys` and `members` differ in length
    #[error("wrapped keys count {wrapped} must equal members count {members}")]
    WrappedKeysCountMismatch {
        /// Number of wrapped keys
        wrapped: usize,
        /// Number of members
        members: usize,
    },

    /// A wrapped key names an identity outside `members`
    #[error("wrapped key refers to an identity not in members")]
    WrappedKeyNotMember,

    /// A wrapped key is empty or exceeds the maximum length
    #[error("wrapped key length {len} outside 1..={max}")]
    WrappedKeyTooLong {
        /// Length supplied
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Wrapped keys do not cover every member exactly once
    #[error("wrapped keys missing or duplicate for a member")]
    WrappedKeysMissingOrDuplicate,

    /// Ciphertext is empty or exceeds the maximum length
    #[error("ciphertext length {len} outside 1..={max}")]
    CiphertextTooLong {
        /// Length supplied
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Nonce is empty or exceeds the maximum length
    #[error("nonce length {len} outside 1..={max}")]
    NonceTooLong {
        /// Length supplied
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Message was encrypted under a key version other than the current one
    #[error("key version mismatch: expected {expected}, got {actual}")]
    KeyVersionMismatch {
        /// Group's current key version
        expected: u64,
        /// Version named by the instruction
        actual: u64,
    },

    /// Counter or key version would overflow
    #[error("math overflow")]
    MathOverflow,

    /// A group (or its counter) already exists at the derived address
    #[error("group already exists at {0}")]
    GroupAlreadyExists(Address),

    /// No group exists at the derived address
    #[error("group not found at {0}")]
    GroupNotFound(Address),

    /// Group exists but its counter account does not
    #[error("group counter not found at {0}")]
    CounterNotFound(Address),

    /// Counter's back-reference does not point at this group
    #[error("counter does not belong to group {0}")]
    CounterGroupMismatch(Address),

    /// A message account already exists for the allocated id
    #[error("message already exists at {0}")]
    MessageAlreadyExists(Address),
}

impl ProtocolError {
    /// Stable numeric code reported to clients.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidPublicKeyFormat { .. } => 6000,
            Self::NoMembers => 6001,
            Self::TooManyMembers { .. } => 6002,
            Self::CreatorNotMember => 6003,
            Self::GroupIdMismatch => 6004,
            Self::NotGroupMember => 6005,
            Self::WrappedKeysCountMismatch { .. } => 6006,
            Self::WrappedKeyNotMember => 6007,
            Self::WrappedKeyTooLong { .. } => 6008,
            Self::WrappedKeysMissingOrDuplicate => 6009,
            Self::CiphertextTooLong { .. } => 6010,
            Self::NonceTooLong { .. } => 6011,
            Self::KeyVersionMismatch { .. } => 6012,
            Self::MathOverflow => 6013,
            Self::GroupAlreadyExists(_) => 6014,
            Self::GroupNotFound(_) => 6015,
            Self::CounterNotFound(_) => 6016,
            Self::CounterGroupMismatch(_) => 6017,
            Self::MessageAlreadyExists(_) => 6018,
        }
    }

    /// Which class of rejection this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPublicKeyFormat { .. }
            | Self::NoMembers
            | Self::TooManyMembers { .. }
            | Self::WrappedKeyTooLong { .. }
            | Self::CiphertextTooLong { .. }
            | Self::NonceTooLong { .. } => ErrorKind::Format,

            Self::MathOverflow => ErrorKind::Arithmetic,

            Self::CreatorNotMember
            | Self::GroupIdMismatch
            | Self::NotGroupMember
            | Self::WrappedKeysCountMismatch { .. }
            | Self::WrappedKeyNotMember
            | Self::WrappedKeysMissingOrDuplicate
            | Self::KeyVersionMismatch { .. }
            | Self::GroupAlreadyExists(_)
            | Self::GroupNotFound(_)
            | Self::CounterNotFound(_)
            | Self::CounterGroupMismatch(_)
            | Self::MessageAlreadyExists(_) => ErrorKind::Consistency,
        }
    }
}

/// Environment faults the core cannot resolve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Account storage failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Account bytes could not be decoded as the expected type
    #[error("corrupt account at {address}: {reason}")]
    CorruptAccount {
        /// Account address
        address: Address,
        /// Decoder error
        reason: String,
    },

    /// Transaction or account could not be encoded/decoded
    #[error("codec error: {0}")]
    Codec(String),
}

/// Outcome of a failed instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// Instruction was refused; no account changed
    #[error("rejected ({code}): {0}", code = .0.code())]
    Rejected(#[from] ProtocolError),

    /// The host environment failed
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

/// A [`ProtocolConfig`](crate::config::ProtocolConfig) that cannot be enforced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The largest record the limits admit would not fit in an account
    #[error("largest {account} is {bytes} bytes, account limit is {limit}")]
    AccountTooLarge {
        /// Record type that overflows
        account: &'static str,
        /// Worst-case encoded size under the configured limits
        bytes: u64,
        /// Account size limit
        limit: u64,
    },

    /// `max_members` is zero, so no group can ever be created
    #[error("max_members must be at least 1")]
    NoMembersAllowed,
}

impl ProcessError {
    /// The rejection reason, if this was a rejection.
    pub fn rejection(&self) -> Option<&ProtocolError> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Host(_) => None,
        }
    }
}
