//! mosqbridge-ffi - Mosquitto plugin ABI entry points
//!
//! This crate provides the broker-facing layer:
//! - [`PluginInstance`] for the per-instance lifecycle controller
//! - [`EventRegistry`] for broker callback (un)registration and routing
//! - [`MosquittoHost`] for broker functions resolved from the host process
//! - C ABI entry points, generated by [`mosquitto_plugin!`]
//!
//! # Exported symbols
//!
//! A plugin crate built as a `cdylib` exports:
//!
//! - `mosquitto_plugin_version` - Negotiate the plugin API version
//! - `mosquitto_plugin_init` - Create the instance and register callbacks
//! - `mosquitto_plugin_cleanup` - Unregister callbacks and release the instance
//!
//! Events are delivered through a single callback registered for every kind;
//! the broker passes the instance identifier back as its `userdata`.

pub mod abi;
mod broker;
pub mod codec;
mod exports;
mod handle;
mod host;
mod panic_guard;
mod registry;

pub use broker::BrokerApi;
pub use handle::{BRIDGE_OPTIONS, InstanceManager, PluginInstance};
pub use host::MosquittoHost;
pub use panic_guard::{catch_panic, install_panic_hook};
pub use registry::{EventRegistration, EventRegistry};

// Entry point bodies used by `mosquitto_plugin!`
pub use exports::{event_trampoline, options_from_raw, plugin_cleanup, plugin_init, plugin_version};

// Re-export types needed for plugin implementation
pub use mosqbridge_core::{
    BridgeError, BridgeResult, EventHandler, EventKind, EventPayload, EventReply, LogLevel,
    PluginContext, StatusCode,
};
pub use mosqbridge_logging::LogForwarder;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{BrokerApi, EventRegistry, InstanceManager, PluginInstance};
    pub use mosqbridge_core::prelude::*;
    pub use mosqbridge_logging::prelude::*;
}

/// Generate the `mosquitto_plugin_*` symbols for a plugin crate
///
/// The factory is called once per broker init and must produce the handler
/// for that instance.
///
/// # Example
///
/// ```ignore
/// use mosqbridge_ffi::prelude::*;
///
/// #[derive(Default)]
/// struct MyHandler;
///
/// // ... implement EventHandler ...
///
/// mosqbridge_ffi::mosquitto_plugin!(MyHandler::default);
/// ```
#[macro_export]
macro_rules! mosquitto_plugin {
    ($factory:expr_2021) => {
        /// # Safety
        /// Called by the broker with `count` readable versions.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn mosquitto_plugin_version(
            count: ::std::ffi::c_int,
            versions: *const ::std::ffi::c_int,
        ) -> ::std::ffi::c_int {
            unsafe { $crate::plugin_version(count, versions) }
        }

        /// # Safety
        /// Called by the broker with its own identifier and option array.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn mosquitto_plugin_init(
            identifier: *mut ::std::ffi::c_void,
            userdata: *mut *mut ::std::ffi::c_void,
            options: *const $crate::abi::RawOption,
            option_count: ::std::ffi::c_int,
        ) -> ::std::ffi::c_int {
            unsafe {
                $crate::plugin_init(identifier, userdata, options, option_count, || {
                    let handler: ::std::sync::Arc<dyn $crate::EventHandler> =
                        ::std::sync::Arc::new(($factory)());
                    handler
                })
            }
        }

        /// # Safety
        /// Called by the broker with the `userdata` set during init.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn mosquitto_plugin_cleanup(
            userdata: *mut ::std::ffi::c_void,
            _options: *const $crate::abi::RawOption,
            _option_count: ::std::ffi::c_int,
        ) -> ::std::ffi::c_int {
            $crate::plugin_cleanup(userdata)
        }
    };
}
