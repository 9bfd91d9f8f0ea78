//! Transaction reference (STAN) generation
//!
//! A STAN is a fixed-width 12-digit numeric reference, unique across all
//! transactions issued by a running instance. The counter is seeded from the
//! current microsecond timestamp mixed with process-local randomness, so
//! separate instance lifetimes start from independent positions in the
//! reference space rather than clock-adjacent ones; within a lifetime the
//! atomic increment makes collisions impossible, including under concurrent
//! callers.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const STAN_MODULUS: u64 = 1_000_000_000_000;

/// Generator of unique System Trace Audit Numbers
#[derive(Debug)]
pub struct StanGenerator {
    counter: AtomicU64,
}

impl StanGenerator {
    /// Create a generator seeded from the wall clock and process randomness
    ///
    /// The timestamp alone repeats modulo the reference space roughly every
    /// 11.6 days; the random component decorrelates restarts.
    pub fn new() -> Self {
        let micros = chrono::Utc::now().timestamp_micros() as u64;
        let entropy: u64 = rand::thread_rng().gen();
        Self::with_seed(micros ^ entropy)
    }

    /// Create a generator with a fixed seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            counter: AtomicU64::new(seed),
        }
    }

    /// Issue the next 12-digit reference
    pub fn next_stan(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) % STAN_MODULUS;
        format!("{:012}", n)
    }
}

impl Default for StanGenerator {
    fn default() -> Self {
        Self::new()
    }
}
