//! Protocol limits

use serde::{Deserialize, Serialize};

use crate::{
    accounts::{MAX_ACCOUNT_BYTES, group_message_body_bytes, group_state_body_bytes},
    error::ConfigError,
};

/// Maximum members per group
pub const DEFAULT_MAX_MEMBERS: usize = 20;

/// Maximum bytes per wrapped key. A wrapped 32-byte group key is 1160 bytes.
pub const DEFAULT_MAX_WRAPPED_KEY_BYTES: usize = 1200;

/// Maximum bytes per message ciphertext
pub const DEFAULT_MAX_CIPHERTEXT_BYTES: usize = 1200;

/// Maximum bytes per message nonce
pub const DEFAULT_MAX_NONCE_BYTES: usize = 64;

/// Maximum characters in a registered public key string
pub const DEFAULT_MAX_PUBLIC_KEY_CHARS: usize = 2000;

/// Limits enforced by the processor.
///
/// All writers to one ledger must agree on these values; a message accepted
/// under one configuration may be rejected under another. Every record the
/// limits admit must fit in one account, see [`ProtocolConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Maximum members per group
    pub max_members: usize,
    /// Maximum bytes per wrapped key
    pub max_wrapped_key_bytes: usize,
    /// Maximum bytes per message ciphertext
    pub max_ciphertext_bytes: usize,
    /// Maximum bytes per message nonce
    pub max_nonce_bytes: usize,
    /// Maximum characters in a registered public key string
    pub max_public_key_chars: usize,
    /// Key version assigned at group creation
    pub initial_key_version: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_members: DEFAULT_MAX_MEMBERS,
            max_wrapped_key_bytes: DEFAULT_MAX_WRAPPED_KEY_BYTES,
            max_ciphertext_bytes: DEFAULT_MAX_CIPHERTEXT_BYTES,
            max_nonce_bytes: DEFAULT_MAX_NONCE_BYTES,
            max_public_key_chars: DEFAULT_MAX_PUBLIC_KEY_CHARS,
            initial_key_version: 0,
        }
    }
}

impl ProtocolConfig {
    /// Check that the largest group and message these limits accept can be
    /// stored.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NoMembersAllowed` if `max_members` is zero
    /// - `ConfigError::AccountTooLarge` if a full group or a maximal message
    ///   exceeds the account size limit
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_members == 0 {
            return Err(ConfigError::NoMembersAllowed);
        }

        let group = group_state_body_bytes(self.max_members, self.max_wrapped_key_bytes);
        if group > MAX_ACCOUNT_BYTES {
            return Err(ConfigError::AccountTooLarge {
                account: "GroupState",
                bytes: group,
                limit: MAX_ACCOUNT_BYTES,
            });
        }

        let message = group_message_body_bytes(self.max_ciphertext_bytes, self.max_nonce_bytes);
        if message > MAX_ACCOUNT_BYTES {
            return Err(ConfigError::AccountTooLarge {
                account: "GroupMessage",
                bytes: message,
                limit: MAX_ACCOUNT_BYTES,
            });
        }

        Ok(())
    }
}
