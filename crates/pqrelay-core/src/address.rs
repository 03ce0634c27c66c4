//! Derived account addresses
//!
//! Every account lives at a deterministic address computed from a domain tag
//! and the fields that identify it:
//!
//! ```text
//! registry       = H("registry"      , owner)
//! group          = H("group"         , group_id)
//! group counter  = H("group_counter" , group address)
//! group message  = H("gmsg"          , group address, msg_id as u64 LE)
//! ```
//!
//! `H` is SHA-256 over each seed prefixed by its length as a single byte, so
//! two different seed lists can never produce the same preimage.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::identity::{GroupId, Identity};

const REGISTRY_SEED: &[u8] = b"registry";
const GROUP_SEED: &[u8] = b"group";
const COUNTER_SEED: &[u8] = b"group_counter";
const MESSAGE_SEED: &[u8] = b"gmsg";

/// Address of an account in the host ledger.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    /// Wrap raw address bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn derive(seeds: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for seed in seeds {
            debug_assert!(seed.len() <= usize::from(u8::MAX));
            hasher.update([seed.len() as u8]);
            hasher.update(seed);
        }
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}..)", hex::encode(&self.0[..4]))
    }
}

/// Address of `owner`'s registry entry.
pub fn registry_address(owner: &Identity) -> Address {
    Address::derive(&[REGISTRY_SEED, owner.as_bytes()])
}

/// Address of the group state for `group_id`.
pub fn group_address(group_id: &GroupId) -> Address {
    Address::derive(&[GROUP_SEED, group_id.as_bytes()])
}

/// Address of the counter belonging to the group at `group`.
pub fn counter_address(group: &Address) -> Address {
    Address::derive(&[COUNTER_SEED, group.as_bytes()])
}

/// Address of message `msg_id` in the group at `group`.
pub fn message_address(group: &Address, msg_id: u64) -> Address {
    Address::derive(&[MESSAGE_SEED, group.as_bytes(), &msg_id.to_le_bytes()])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let group = group_address(&GroupId::from_bytes([7; 32]));
        assert_eq!(group, group_address(&GroupId::from_bytes([7; 32])));
        assert_eq!(message_address(&group, 3), message_address(&group, 3));
    }

    #[test]
    fn domains_do_not_collide() {
        let raw = [9u8; 32];
        let group = group_address(&GroupId::from_bytes(raw));
        let registry = registry_address(&Identity::from_bytes(raw));
        let counter = counter_address(&group);
        let message = message_address(&group, 0);

        let all: HashSet<Address> = [group, registry, counter, message].into_iter().collect();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn message_ids_map_to_distinct_addresses() {
        let group = group_address(&GroupId::from_bytes([1; 32]));
        let addresses: HashSet<Address> = (0..64).map(|id| message_address(&group, id)).collect();
        assert_eq!(addresses.len(), 64);
    }
}
