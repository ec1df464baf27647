//! Admission gate for in-flight event dispatches
//!
//! Cleanup must not release the plugin context while a dispatch that was
//! admitted earlier is still running. The gate admits dispatches only while
//! open, counts the ones in flight, and lets cleanup close it and wait for the
//! count to drain.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    in_flight: usize,
}

/// Gate between the broker's dispatch threads and instance teardown
#[derive(Debug, Default)]
pub struct DispatchGate {
    state: Mutex<GateState>,
    drained: Condvar,
}

impl DispatchGate {
    /// Create a closed gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Start admitting dispatches
    pub fn open(&self) {
        self.state.lock().open = true;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Admit one dispatch; `None` once the gate is closed
    pub fn enter(&self) -> Option<InFlightGuard<'_>> {
        let mut state = self.state.lock();
        if !state.open {
            return None;
        }
        state.in_flight += 1;
        Some(InFlightGuard { gate: self })
    }

    /// Close the gate and wait for admitted dispatches to finish
    ///
    /// Returns `true` if everything drained within `timeout`. The gate stays
    /// closed either way.
    pub fn close_and_drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        state.open = false;
        while state.in_flight > 0 {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                return state.in_flight == 0;
            }
        }
        true
    }

    fn leave(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.drained.notify_all();
        }
    }
}

/// Marks one admitted dispatch; leaving the gate on drop (including unwinds)
#[must_use = "the dispatch leaves the gate as soon as the guard is dropped"]
pub struct InFlightGuard<'a> {
    gate: &'a DispatchGate,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}

#[cfg(test)]
#[path = "gate/gate_tests.rs"]
mod gate_tests;
