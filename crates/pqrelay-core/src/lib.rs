//! pqrelay group protocol state machine
//!
//! Validates and applies the four state-changing instructions against
//! account snapshots supplied by a host ledger:
//!
//! - `Register`: publish an ML-KEM-768 public key for the signer
//! - `CreateGroup`: create group state and its message counter
//! - `RotateGroupKey`: replace the wrapped group key, bump the key version
//! - `SendGroupMessage`: allocate the next message id and store a ciphertext
//!
//! # Architecture
//!
//! ```text
//! Transaction ──► Processor::validate_and_apply(accounts, slot)
//!                     │
//!                     ├─ Ok(Transition { writes, receipt }) ──► host applies all writes
//!                     └─ Err(ProcessError)                   ──► nothing changes
//! ```
//!
//! The processor is a pure function of its inputs. It reads through
//! [`AccountReader`], never writes, and keeps no state between calls, so the
//! host decides how submissions are serialized. [`MemoryLedger`] is the
//! in-process host used by tests and the CLI.
//!
//! Accounts reference each other by derived [`Address`] only: counters and
//! messages point back at their group, never the reverse.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod accounts;
pub mod address;
pub mod config;
pub mod error;
pub mod host;
pub mod identity;
pub mod instruction;
pub mod ledger;
pub mod processor;
pub mod query;

pub use accounts::{AccountData, GroupCounter, GroupMessage, GroupState, MemberWrappedKey, Registry};
pub use address::{Address, counter_address, group_address, message_address, registry_address};
pub use config::ProtocolConfig;
pub use error::{ConfigError, ErrorKind, HostError, ProcessError, ProtocolError};
pub use host::{AccountReader, AccountWrite, Receipt, Transition, read_typed};
pub use identity::{GroupId, Identity};
pub use instruction::{Instruction, Transaction};
pub use ledger::{ChaoticReader, Ledger, MemoryLedger};
pub use processor::Processor;
pub use query::{
    MessagePage, load_counter, load_group, load_message, load_messages, load_registry,
    member_recipients, wrapped_key_for,
};
