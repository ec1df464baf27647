//! Panic handling for FFI boundaries
//!
//! Unwinding into the broker is undefined behaviour, so every `extern "C"`
//! entry point and every handler invocation runs under [`catch_panic`].

use mosqbridge_core::{BridgeError, BridgeResult, StatusCode};
use std::any::Any;
use std::panic;
use std::sync::Once;

/// Run `f`, turning a panic into [`StatusCode::Unknown`]
///
/// The panic is logged; the caller decides what the broker sees.
pub fn catch_panic<F, R>(f: F) -> Result<R, StatusCode>
where
    F: FnOnce() -> R + panic::UnwindSafe,
{
    panic::catch_unwind(f).map_err(|payload| {
        tracing::error!("FFI panic caught: {}", panic_message(payload.as_ref()));
        StatusCode::Unknown
    })
}

/// Run a fallible plugin hook, turning a panic into [`BridgeError::Panic`]
///
/// Lets lifecycle code treat a panicking hook like one that returned an
/// error, so rollback and teardown still run.
pub(crate) fn contain_panic<T>(f: impl FnOnce() -> BridgeResult<T>) -> BridgeResult<T> {
    panic::catch_unwind(panic::AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(BridgeError::Panic(panic_message(payload.as_ref()))))
}

/// Convert a panic payload to a human-readable string
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("plugin panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("plugin panicked: {s}")
    } else {
        "plugin panicked with unknown payload".to_string()
    }
}

static HOOK: Once = Once::new();

/// Route panic reports through `tracing` so they reach the broker log
///
/// Installed once per process; the previously installed hook still runs
/// afterwards so the host keeps its own reporting.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string());
            tracing::error!("PANIC at {location}: {}", panic_message(info.payload()));
            previous(info);
        }));
    });
}
