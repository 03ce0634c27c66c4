//! Account reader wrapper for fault injection testing
//!
//! Fails a configurable fraction of reads with `HostError::Storage`, so tests
//! can check that host faults surface unchanged and never produce writes.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use crate::{address::Address, error::HostError, host::AccountReader};

/// Reader that delegates to `inner` but randomly fails.
///
/// The RNG is seeded, so a given seed fails the same reads on every run.
#[derive(Clone)]
pub struct ChaoticReader<R> {
    inner: R,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<SplitMix64>>,
}

/// SplitMix64, enough for reproducible fault schedules
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    /// Next value in [0.0, 1.0)
    fn next_unit(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl<R: AccountReader> ChaoticReader<R> {
    /// Wrap `inner`, failing reads with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: R, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self { inner, failure_rate, rng: Arc::new(Mutex::new(SplitMix64 { state: seed })) }
    }

    /// The wrapped reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    #[allow(clippy::expect_used)]
    fn should_fail(&self) -> bool {
        self.rng.lock().expect("Mutex poisoned").next_unit() < self.failure_rate
    }
}

impl<R: AccountReader> AccountReader for ChaoticReader<R> {
    fn read_account(&self, address: &Address) -> Result<Option<Vec<u8>>, HostError> {
        if self.should_fail() {
            return Err(HostError::Storage(format!("injected read failure at {address}")));
        }
        self.inner.read_account(address)
    }
}
