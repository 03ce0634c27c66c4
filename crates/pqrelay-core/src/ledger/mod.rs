//! Host ledger abstraction
//!
//! A [`Ledger`] owns account storage and the slot counter. It runs each
//! submitted transaction through the [`Processor`](crate::Processor) and
//! applies the resulting writes all-or-nothing. Implementations serialize
//! submissions so that two messages to one group never consume the same
//! counter value.

mod chaotic;
mod memory;

pub use chaotic::ChaoticReader;
pub use memory::MemoryLedger;

use crate::{
    error::ProcessError,
    host::{AccountReader, Receipt},
    instruction::Transaction,
};

/// A ledger that accepts transactions.
///
/// Must be Clone (handles share the same accounts) and thread-safe.
pub trait Ledger: AccountReader + Clone + Send + Sync + 'static {
    /// Slot the next accepted transaction is stamped with.
    fn current_slot(&self) -> u64;

    /// Validate `tx` and, if accepted, apply its writes and advance the slot.
    ///
    /// # Invariants
    ///
    /// - Post: on `Err`, no account changed and the slot did not advance
    fn submit(&self, tx: &Transaction) -> Result<Receipt, ProcessError>;

    /// Decode a CBOR transaction and submit it.
    fn submit_cbor(&self, bytes: &[u8]) -> Result<Receipt, ProcessError> {
        let tx = Transaction::from_cbor(bytes)?;
        self.submit(&tx)
    }
}
