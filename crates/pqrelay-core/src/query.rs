//! Read-side queries for clients
//!
//! Typed lookups over an [`AccountReader`]. Nothing here validates or
//! writes; a missing account is `Ok(None)`, a broken one is a host fault.

use pqrelay_crypto::{KemPublicKey, MemberRecipient};

use crate::{
    accounts::{GroupCounter, GroupMessage, GroupState, Registry},
    address::{counter_address, group_address, message_address, registry_address},
    error::HostError,
    host::{AccountReader, read_typed},
    identity::{GroupId, Identity},
};

/// One page of a group's messages, in `msg_id` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    /// Messages `from..from + messages.len()`
    pub messages: Vec<GroupMessage>,
    /// Whether messages beyond this page exist
    pub has_more: bool,
}

/// `owner`'s registry entry.
pub fn load_registry<R: AccountReader + ?Sized>(
    reader: &R,
    owner: &Identity,
) -> Result<Option<Registry>, HostError> {
    read_typed(reader, &registry_address(owner))
}

/// State of group `group_id`.
pub fn load_group<R: AccountReader + ?Sized>(
    reader: &R,
    group_id: &GroupId,
) -> Result<Option<GroupState>, HostError> {
    read_typed(reader, &group_address(group_id))
}

/// Message counter of group `group_id`.
pub fn load_counter<R: AccountReader + ?Sized>(
    reader: &R,
    group_id: &GroupId,
) -> Result<Option<GroupCounter>, HostError> {
    read_typed(reader, &counter_address(&group_address(group_id)))
}

/// Message `msg_id` of group `group_id`.
pub fn load_message<R: AccountReader + ?Sized>(
    reader: &R,
    group_id: &GroupId,
    msg_id: u64,
) -> Result<Option<GroupMessage>, HostError> {
    read_typed(reader, &message_address(&group_address(group_id), msg_id))
}

/// Up to `limit` messages starting at `from`.
///
/// A group without a counter yields an empty page. Every id below the
/// counter's `next_id` must have a message; a gap is reported as a corrupt
/// account.
pub fn load_messages<R: AccountReader + ?Sized>(
    reader: &R,
    group_id: &GroupId,
    from: u64,
    limit: usize,
) -> Result<MessagePage, HostError> {
    let Some(counter) = load_counter(reader, group_id)? else {
        return Ok(MessagePage { messages: Vec::new(), has_more: false });
    };

    let group = group_address(group_id);
    let end = from.saturating_add(limit as u64).min(counter.next_id);

    let mut messages = Vec::with_capacity(end.saturating_sub(from) as usize);
    for msg_id in from..end {
        let address = message_address(&group, msg_id);
        let Some(message) = read_typed::<GroupMessage, _>(reader, &address)? else {
            return Err(HostError::CorruptAccount {
                address,
                reason: format!("message {msg_id} missing below counter {}", counter.next_id),
            });
        };
        messages.push(message);
    }

    Ok(MessagePage { messages, has_more: end.max(from) < counter.next_id })
}

/// The current group key as wrapped for `member`, if the group exists and
/// `member` belongs to it.
pub fn wrapped_key_for<R: AccountReader + ?Sized>(
    reader: &R,
    group_id: &GroupId,
    member: &Identity,
) -> Result<Option<Vec<u8>>, HostError> {
    Ok(load_group(reader, group_id)?
        .and_then(|group| group.wrapped_key_for(member).map(<[u8]>::to_vec)))
}

/// Resolve each member's registered encapsulation key, ready for
/// `wrap_for_members`.
///
/// Members with no registry entry, or whose stored key no longer parses,
/// get `public_key: None`.
pub fn member_recipients<R: AccountReader + ?Sized>(
    reader: &R,
    members: &[Identity],
) -> Result<Vec<MemberRecipient<Identity>>, HostError> {
    members
        .iter()
        .map(|member| {
            let public_key = load_registry(reader, member)?
                .and_then(|registry| KemPublicKey::from_base64(&registry.pq_public_key).ok());
            Ok(MemberRecipient { identity: *member, public_key })
        })
        .collect()
}
