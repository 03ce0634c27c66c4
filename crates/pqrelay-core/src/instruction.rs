//! Instructions and signed transactions
//!
//! A [`Transaction`] is what the host hands the processor: one instruction
//! plus the identity whose signature the host has already verified. It is
//! carried between host and client as CBOR.

use serde::{Deserialize, Serialize};

use crate::{
    accounts::MemberWrappedKey,
    error::HostError,
    identity::{GroupId, Identity},
};

/// A state-changing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Publish (or replace) the signer's encapsulation key
    Register {
        /// Base64-encoded ML-KEM-768 public key
        pq_public_key: String,
    },

    /// Create a group with the signer as a founding member
    CreateGroup {
        /// Caller-chosen group id
        group_id: GroupId,
        /// Initial (and permanent) members
        members: Vec<Identity>,
        /// First group key wrapped for each member
        wrapped_keys: Vec<MemberWrappedKey>,
    },

    /// Replace the group key for the existing members
    RotateGroupKey {
        /// Group to rotate
        group_id: GroupId,
        /// New group key wrapped for each member
        wrapped_keys: Vec<MemberWrappedKey>,
    },

    /// Append an encrypted message to the group
    SendGroupMessage {
        /// Target group
        group_id: GroupId,
        /// Key version the ciphertext was sealed under
        key_version: u64,
        /// AEAD ciphertext
        ciphertext: Vec<u8>,
        /// AEAD nonce
        nonce: Vec<u8>,
    },
}

impl Instruction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::CreateGroup { .. } => "create_group",
            Self::RotateGroupKey { .. } => "rotate_group_key",
            Self::SendGroupMessage { .. } => "send_group_message",
        }
    }
}

/// An instruction together with its verified signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Identity that signed the transaction
    pub signer: Identity,
    /// Requested state change
    pub instruction: Instruction,
}

impl Transaction {
    /// Pair an instruction with its signer.
    pub fn new(signer: Identity, instruction: Instruction) -> Self {
        Self { signer, instruction }
    }

    /// Encode as CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>, HostError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes).map_err(|e| HostError::Codec(e.to_string()))?;
        Ok(bytes)
    }

    /// Decode from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, HostError> {
        ciborium::de::from_reader(bytes).map_err(|e| HostError::Codec(e.to_string()))
    }
}
