//! Boundary between the processor and the host ledger
//!
//! The host supplies account snapshots through [`AccountReader`] and applies
//! the [`Transition`] the processor returns. The processor itself never
//! writes.

use std::collections::{BTreeMap, HashMap};

use crate::{
    accounts::AccountData,
    address::Address,
    error::HostError,
    identity::Identity,
};

/// Read access to account snapshots.
pub trait AccountReader {
    /// Bytes stored at `address`, or `None` if no account exists there.
    fn read_account(&self, address: &Address) -> Result<Option<Vec<u8>>, HostError>;
}

impl AccountReader for HashMap<Address, Vec<u8>> {
    fn read_account(&self, address: &Address) -> Result<Option<Vec<u8>>, HostError> {
        Ok(self.get(address).cloned())
    }
}

impl AccountReader for BTreeMap<Address, Vec<u8>> {
    fn read_account(&self, address: &Address) -> Result<Option<Vec<u8>>, HostError> {
        Ok(self.get(address).cloned())
    }
}

/// Read and decode the account at `address`.
pub fn read_typed<T, R>(reader: &R, address: &Address) -> Result<Option<T>, HostError>
where
    T: AccountData,
    R: AccountReader + ?Sized,
{
    reader
        .read_account(address)?
        .map(|bytes| T::from_account_bytes(address, &bytes))
        .transpose()
}

/// Full replacement contents of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWrite {
    /// Account to create or overwrite
    pub address: Address,
    /// New account blob
    pub data: Vec<u8>,
}

impl AccountWrite {
    /// Encode `record` for `address`.
    pub fn encode<T: AccountData>(address: Address, record: &T) -> Result<Self, HostError> {
        Ok(Self { address, data: record.to_account_bytes()? })
    }
}

/// What an accepted instruction did, for the submitting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    /// Registry entry created or replaced
    Registered {
        /// Registering identity
        owner: Identity,
        /// Registry account
        registry: Address,
    },

    /// Group and counter created
    GroupCreated {
        /// Group account
        group: Address,
        /// Counter account
        counter: Address,
        /// Initial key version
        key_version: u64,
    },

    /// Group key replaced
    GroupKeyRotated {
        /// Group account
        group: Address,
        /// New key version
        key_version: u64,
    },

    /// Message appended
    MessageSent {
        /// Group account
        group: Address,
        /// Message account
        message: Address,
        /// Allocated message id
        msg_id: u64,
    },
}

/// Account writes to apply atomically, and the resulting receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Accounts to write, all or nothing
    pub writes: Vec<AccountWrite>,
    /// Outcome summary
    pub receipt: Receipt,
}
