//! Fuzz target for account blob and transaction decoding
//!
//! # Invariants
//!
//! - NEVER panic on malformed bytes
//! - Huge claimed lengths are rejected, not allocated
//! - Anything that decodes re-encodes to the same bytes

#![no_main]

use libfuzzer_sys::fuzz_target;
use pqrelay_core::{
    AccountData, Address, GroupCounter, GroupMessage, GroupState, Registry, Transaction,
};

fn check<T: AccountData + PartialEq + std::fmt::Debug>(data: &[u8]) {
    let address = Address::from_bytes([0; 32]);
    if let Ok(record) = T::from_account_bytes(&address, data) {
        let Ok(encoded) = record.to_account_bytes() else {
            panic!("decoded record failed to re-encode");
        };
        assert_eq!(encoded, data);
    }
}

fuzz_target!(|data: &[u8]| {
    check::<Registry>(data);
    check::<GroupState>(data);
    check::<GroupCounter>(data);
    check::<GroupMessage>(data);

    let _ = Transaction::from_cbor(data);
});
