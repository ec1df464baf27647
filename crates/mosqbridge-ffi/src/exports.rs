//! C ABI entry points
//!
//! These are the bodies behind the symbols generated by
//! [`mosquitto_plugin!`](crate::mosquitto_plugin). Each public function here
//! is panic-safe and resolves to a raw broker status code.

use crate::abi::RawOption;
use crate::broker::BrokerApi;
use crate::codec::{apply_message_mutation, borrow_str, decode_event, read_user_properties};
use crate::handle::{InstanceManager, PluginInstance};
use crate::host::MosquittoHost;
use crate::panic_guard::{catch_panic, install_panic_hook};
use mosqbridge_core::{
    BridgeResult, EventHandler, EventKind, OptionEntry, PLUGIN_API_VERSIONS, PluginIdentifier,
    StatusCode, VERSION_ABORT, version_reply,
};
use mosqbridge_logging::{LogForwarder, init_logging};
use once_cell::sync::OnceCell;
use std::ffi::{c_int, c_void};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Broker functions, resolved on first init
static HOST: OnceCell<Arc<MosquittoHost>> = OnceCell::new();

fn host() -> BridgeResult<Arc<MosquittoHost>> {
    HOST.get_or_try_init(|| MosquittoHost::resolve(event_trampoline).map(Arc::new))
        .cloned()
}

/// Copy the broker's option array into owned entries
///
/// Entries with a null key are skipped; a null value reads as empty.
///
/// # Safety
/// `options` must be null or point to `count` valid `mosquitto_opt` structs.
pub unsafe fn options_from_raw(options: *const RawOption, count: c_int) -> Vec<OptionEntry> {
    let Ok(count) = usize::try_from(count) else {
        return Vec::new();
    };
    if options.is_null() || count == 0 {
        return Vec::new();
    }

    // SAFETY: caller guarantees `count` readable elements
    let raw = unsafe { std::slice::from_raw_parts(options, count) };
    raw.iter()
        .filter(|opt| !opt.key.is_null())
        // SAFETY: non-null option strings are NUL-terminated broker memory
        .map(|opt| unsafe { OptionEntry::new(borrow_str(opt.key), borrow_str(opt.value)) })
        .collect()
}

/// `mosquitto_plugin_version`
///
/// Returns the highest plugin API version both sides support, or
/// [`VERSION_ABORT`] so the broker refuses the plugin before init.
///
/// # Safety
/// `versions` must be null or point to `count` readable ints.
pub unsafe fn plugin_version(count: c_int, versions: *const c_int) -> c_int {
    catch_panic(AssertUnwindSafe(|| {
        let broker: &[c_int] = match usize::try_from(count) {
            Ok(len) if len > 0 && !versions.is_null() => {
                // SAFETY: caller guarantees `count` readable elements
                unsafe { std::slice::from_raw_parts(versions, len) }
            }
            _ => &[],
        };

        let reply = version_reply(broker, PLUGIN_API_VERSIONS);
        if reply == VERSION_ABORT {
            tracing::error!(
                broker = ?broker,
                plugin = ?PLUGIN_API_VERSIONS,
                "no common plugin API version"
            );
        }
        reply
    }))
    .unwrap_or(VERSION_ABORT)
}

/// `mosquitto_plugin_init`
///
/// # Safety
/// Arguments must be the ones the broker passed to `mosquitto_plugin_init`.
pub unsafe fn plugin_init<F>(
    identifier: *mut c_void,
    userdata: *mut *mut c_void,
    options: *const RawOption,
    option_count: c_int,
    factory: F,
) -> c_int
where
    F: FnOnce() -> Arc<dyn EventHandler>,
{
    catch_panic(AssertUnwindSafe(|| {
        // SAFETY: forwarded from the caller
        unsafe { plugin_init_impl(identifier, userdata, options, option_count, factory) }
    }))
    .unwrap_or_else(|status| status)
    .as_raw()
}

unsafe fn plugin_init_impl<F>(
    identifier: *mut c_void,
    userdata: *mut *mut c_void,
    options: *const RawOption,
    option_count: c_int,
    factory: F,
) -> StatusCode
where
    F: FnOnce() -> Arc<dyn EventHandler>,
{
    let Some(identifier) = PluginIdentifier::from_ptr(identifier) else {
        return StatusCode::Inval;
    };

    let host = match host() {
        Ok(host) => host,
        Err(e) => {
            tracing::error!(error = %e, "broker functions unavailable");
            return e.status_code();
        }
    };
    LogForwarder::global().set_sink(Some(host.clone()));
    init_logging();
    install_panic_hook();

    // SAFETY: forwarded from the caller
    let entries = unsafe { options_from_raw(options, option_count) };
    let broker: Arc<dyn BrokerApi> = host;

    // Registered before attaching so early events can find the instance
    let instance = Arc::new(PluginInstance::new(identifier, broker, factory()));
    let manager = InstanceManager::global();
    if manager.insert(instance.clone()).is_some() {
        tracing::warn!(%identifier, "replaced a stale instance with the same identifier");
    }
    if !userdata.is_null() {
        // SAFETY: broker-provided out pointer
        unsafe { *userdata = identifier.as_ptr() };
    }

    let status = instance.on_init(&entries);
    if !status.is_success() {
        manager.remove(identifier);
        if !userdata.is_null() {
            // SAFETY: broker-provided out pointer
            unsafe { *userdata = std::ptr::null_mut() };
        }
    }
    status
}

/// `mosquitto_plugin_cleanup`
///
/// `userdata` is the value stored during init.
pub fn plugin_cleanup(userdata: *mut c_void) -> c_int {
    catch_panic(|| {
        let Some(identifier) = PluginIdentifier::from_ptr(userdata) else {
            return StatusCode::Inval;
        };
        let Some(instance) = InstanceManager::global().get(identifier) else {
            tracing::warn!(%identifier, "cleanup for unknown plugin instance");
            return StatusCode::Unknown;
        };

        let status = instance.on_cleanup();
        InstanceManager::global().remove(identifier);
        status
    })
    .unwrap_or_else(|status| status)
    .as_raw()
}

/// Callback registered with the broker for every event kind
///
/// # Safety
/// Only the broker calls this, with the `userdata` given at registration and
/// event data matching `event`.
pub unsafe extern "C" fn event_trampoline(
    event: c_int,
    event_data: *mut c_void,
    userdata: *mut c_void,
) -> c_int {
    catch_panic(AssertUnwindSafe(|| {
        // SAFETY: forwarded from the caller
        unsafe { dispatch_raw(event, event_data, userdata) }
    }))
    .unwrap_or_else(|status| status)
    .as_raw()
}

unsafe fn dispatch_raw(event: c_int, event_data: *mut c_void, userdata: *mut c_void) -> StatusCode {
    let Some(kind) = EventKind::from_raw(event) else {
        tracing::debug!(event, "unknown event kind");
        return StatusCode::PluginDefer;
    };
    let Some(instance) =
        PluginIdentifier::from_ptr(userdata).and_then(|id| InstanceManager::global().get(id))
    else {
        return kind.pass_through_status();
    };
    let Some(host) = HOST.get() else {
        return kind.pass_through_status();
    };

    // SAFETY: the broker passes the struct matching `event`; the properties
    // are copied out, the rest is borrowed until dispatch returns
    let user_properties = unsafe { read_user_properties(kind, event_data, host.properties()) };
    let payload = unsafe { decode_event(kind, event_data, host.clients(), &user_properties) };
    let outcome = instance.dispatch(&payload);

    if let Some(mutation) = &outcome.mutation {
        if kind == EventKind::Message {
            // SAFETY: message event data, allocated by the broker
            let status = unsafe { apply_message_mutation(event_data, mutation, host.allocator()) };
            if !status.is_success() {
                tracing::warn!(%status, "could not apply message changes");
                return status;
            }
        }
    }

    outcome.status
}
