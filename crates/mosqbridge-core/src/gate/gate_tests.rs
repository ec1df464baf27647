#![allow(non_snake_case)]

use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[test]
fn DispatchGate___new___starts_closed() {
    let gate = DispatchGate::new();

    assert!(!gate.is_open());
    assert!(gate.enter().is_none());
}

#[test]
fn DispatchGate___open___admits_and_counts() {
    let gate = DispatchGate::new();
    gate.open();

    let first = gate.enter();
    let second = gate.enter();

    assert!(first.is_some());
    assert!(second.is_some());
    assert_eq!(gate.in_flight(), 2);

    drop(first);
    drop(second);

    assert_eq!(gate.in_flight(), 0);
}

#[test]
fn DispatchGate___close_and_drain_idle___returns_immediately() {
    let gate = DispatchGate::new();
    gate.open();

    let drained = gate.close_and_drain(Duration::from_millis(10));

    assert!(drained);
    assert!(gate.enter().is_none());
}

#[test]
fn DispatchGate___close_and_drain___waits_for_in_flight_guard() {
    let gate = Arc::new(DispatchGate::new());
    gate.open();
    let released = Arc::new(AtomicBool::new(false));

    let guard_gate = gate.clone();
    let guard_released = released.clone();
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let worker = thread::spawn(move || {
        let _guard = guard_gate.enter().unwrap();
        entered_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        guard_released.store(true, Ordering::SeqCst);
    });
    entered_rx.recv().unwrap();

    let drained = gate.close_and_drain(Duration::from_secs(5));

    assert!(drained);
    assert!(released.load(Ordering::SeqCst), "drain returned before the guard");
    worker.join().unwrap();
}

#[test]
fn DispatchGate___close_and_drain___times_out_with_stuck_guard() {
    let gate = DispatchGate::new();
    gate.open();
    let guard = gate.enter().unwrap();

    let drained = gate.close_and_drain(Duration::from_millis(20));

    assert!(!drained);
    assert!(gate.enter().is_none(), "gate must stay closed after timeout");
    drop(guard);
    assert_eq!(gate.in_flight(), 0);
}

#[test]
fn InFlightGuard___dropped_during_unwind___leaves_gate() {
    let gate = DispatchGate::new();
    gate.open();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _guard = gate.enter().unwrap();
        panic!("handler blew up");
    }));

    assert!(result.is_err());
    assert_eq!(gate.in_flight(), 0);
}
