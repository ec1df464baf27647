//! Broker functions resolved from the host process
//!
//! The plugin is loaded into the broker, so the broker's exported functions
//! are already in the process image. Resolving them at runtime keeps this
//! crate free of link-time references to the broker library, which is what
//! lets the bridge be built and unit tested without it.

use crate::abi::{
    ClientAccessors, EventCallback, HostAllocator, LogPrintfFn, PropertyReader, RegisterFn,
    UnregisterFn,
};
use crate::broker::BrokerApi;
use libloading::{Library, Symbol};
use mosqbridge_core::{BridgeError, BridgeResult, EventKind, LogLevel, PluginIdentifier, StatusCode};
use mosqbridge_logging::LogSink;
use std::ffi::CString;

/// The running broker, as seen from the plugin
pub struct MosquittoHost {
    /// Keeps the process handle open for as long as the pointers are used
    _library: Library,
    callback: EventCallback,
    register: RegisterFn,
    unregister: UnregisterFn,
    log_printf: LogPrintfFn,
    clients: ClientAccessors,
    allocator: HostAllocator,
    properties: PropertyReader,
}

fn open_process() -> BridgeResult<Library> {
    #[cfg(unix)]
    {
        Ok(libloading::os::unix::Library::this().into())
    }
    #[cfg(windows)]
    {
        libloading::os::windows::Library::this()
            .map(Into::into)
            .map_err(|e| BridgeError::Host(format!("cannot open host process: {e}")))
    }
}

/// Copy a function pointer out of the library
///
/// # Safety
/// `T` must match the real signature of the named symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> BridgeResult<T> {
    // SAFETY: the caller picks T to match the exported symbol
    let sym: Symbol<T> = unsafe { library.get(name) }.map_err(|e| {
        BridgeError::Host(format!(
            "{}: {e}",
            String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name))
        ))
    })?;
    Ok(*sym)
}

impl MosquittoHost {
    /// Resolve every broker function the bridge uses
    ///
    /// `callback` is the function registered for every event kind; the
    /// instance identifier is passed as its `userdata`. Fails with
    /// [`BridgeError::Host`] when not running inside the broker.
    pub fn resolve(callback: EventCallback) -> BridgeResult<Self> {
        let library = open_process()?;

        // SAFETY: each type alias mirrors the prototype in mosquitto_broker.h
        unsafe {
            let register = symbol::<RegisterFn>(&library, b"mosquitto_callback_register\0")?;
            let unregister = symbol::<UnregisterFn>(&library, b"mosquitto_callback_unregister\0")?;
            let log_printf = symbol::<LogPrintfFn>(&library, b"mosquitto_log_printf\0")?;
            let clients = ClientAccessors {
                id: symbol(&library, b"mosquitto_client_id\0")?,
                username: symbol(&library, b"mosquitto_client_username\0")?,
                address: symbol(&library, b"mosquitto_client_address\0")?,
                protocol_version: symbol(&library, b"mosquitto_client_protocol_version\0")?,
            };
            let allocator = HostAllocator {
                strdup: symbol(&library, b"mosquitto_strdup\0")?,
                malloc: symbol(&library, b"mosquitto_malloc\0")?,
                free: symbol(&library, b"mosquitto_free\0")?,
            };
            let properties = PropertyReader {
                read_string_pair: symbol(&library, b"mosquitto_property_read_string_pair\0")?,
                free: allocator.free,
            };

            Ok(Self {
                _library: library,
                callback,
                register,
                unregister,
                log_printf,
                clients,
                allocator,
                properties,
            })
        }
    }

    pub fn clients(&self) -> &ClientAccessors {
        &self.clients
    }

    pub fn allocator(&self) -> &HostAllocator {
        &self.allocator
    }

    pub fn properties(&self) -> &PropertyReader {
        &self.properties
    }
}

impl BrokerApi for MosquittoHost {
    fn register_event(&self, identifier: PluginIdentifier, kind: EventKind) -> StatusCode {
        // SAFETY: identifier came from the broker's init call; event_data is
        // unused for every kind the bridge registers
        let raw = unsafe {
            (self.register)(
                identifier.as_ptr(),
                kind.as_raw(),
                self.callback,
                std::ptr::null(),
                identifier.as_ptr(),
            )
        };
        StatusCode::from_raw(raw)
    }

    fn unregister_event(&self, identifier: PluginIdentifier, kind: EventKind) -> StatusCode {
        // SAFETY: same identifier and callback pair as the registration
        let raw = unsafe {
            (self.unregister)(
                identifier.as_ptr(),
                kind.as_raw(),
                self.callback,
                std::ptr::null(),
            )
        };
        StatusCode::from_raw(raw)
    }
}

impl LogSink for MosquittoHost {
    fn write(&self, level: LogLevel, message: &str) {
        let Some(bits) = level.broker_level() else {
            return;
        };
        let Ok(message) = CString::new(message) else {
            return;
        };
        // SAFETY: fixed "%s" format with one C string argument
        unsafe { (self.log_printf)(bits, c"%s".as_ptr(), message.as_ptr()) };
    }
}

impl std::fmt::Debug for MosquittoHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MosquittoHost").finish_non_exhaustive()
    }
}
