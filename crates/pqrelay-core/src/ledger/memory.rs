#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::info;

use super::Ledger;
use crate::{
    address::Address,
    config::ProtocolConfig,
    error::{ConfigError, HostError, ProcessError},
    host::{AccountReader, Receipt},
    instruction::Transaction,
    processor::Processor,
};

/// In-memory ledger for tests, simulation and the CLI demo
///
/// Accounts live in a `HashMap` behind `Arc<Mutex<>>`, so clones share state.
/// `submit` holds the lock across read, validation and write, which gives
/// each transaction exclusive access to every account it touches. Panics if
/// the mutex is poisoned, which is acceptable for test/simulation code.
#[derive(Clone)]
pub struct MemoryLedger {
    processor: Processor,
    inner: Arc<Mutex<MemoryLedgerInner>>,
}

struct MemoryLedgerInner {
    accounts: HashMap<Address, Vec<u8>>,
    /// Slot the next accepted transaction receives
    slot: u64,
}

impl MemoryLedger {
    /// Create an empty ledger starting at slot 1.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` is rejected by [`Processor::new`].
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        Self::with_slot(config, 1)
    }

    /// Create an empty ledger starting at `slot`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` is rejected by [`Processor::new`].
    pub fn with_slot(config: ProtocolConfig, slot: u64) -> Result<Self, ConfigError> {
        Ok(Self::with_processor(Processor::new(config)?, slot))
    }

    fn with_processor(processor: Processor, slot: u64) -> Self {
        Self {
            processor,
            inner: Arc::new(Mutex::new(MemoryLedgerInner { accounts: HashMap::new(), slot })),
        }
    }

    /// Processor used for submissions.
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Move the slot forward by `slots` without submitting anything.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn advance_slot(&self, slots: u64) {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.slot = inner.slot.saturating_add(slots);
    }

    /// Number of accounts stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn account_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").accounts.len()
    }

    /// Copy of every account, for comparing before/after states.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn snapshot(&self) -> HashMap<Address, Vec<u8>> {
        self.inner.lock().expect("Mutex poisoned").accounts.clone()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::with_processor(Processor::default(), 1)
    }
}

impl AccountReader for MemoryLedger {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn read_account(&self, address: &Address) -> Result<Option<Vec<u8>>, HostError> {
        Ok(self.inner.lock().expect("Mutex poisoned").accounts.get(address).cloned())
    }
}

impl Ledger for MemoryLedger {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn current_slot(&self) -> u64 {
        self.inner.lock().expect("Mutex poisoned").slot
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn submit(&self, tx: &Transaction) -> Result<Receipt, ProcessError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let slot = inner.slot;

        let transition = self.processor.validate_and_apply(tx, &inner.accounts, slot)?;

        for write in transition.writes {
            inner.accounts.insert(write.address, write.data);
        }
        inner.slot = slot.saturating_add(1);

        info!(instruction = tx.instruction.name(), slot, "transaction committed");

        Ok(transition.receipt)
    }
}
