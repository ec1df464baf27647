//! Hot-path log throttling

use std::sync::atomic::{AtomicU64, Ordering};

/// Lets through one call in every `every`
///
/// The first call is always sampled. Safe to share between threads; under
/// contention the exact calls chosen may vary but the rate holds.
#[derive(Debug)]
pub struct Sampler {
    every: u64,
    counter: AtomicU64,
}

impl Sampler {
    /// A period of zero behaves like one (sample everything)
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            counter: AtomicU64::new(0),
        }
    }

    pub fn every(&self) -> u64 {
        self.every
    }

    pub fn should_sample(&self) -> bool {
        self.counter.fetch_add(1, Ordering::Relaxed) % self.every == 0
    }
}
