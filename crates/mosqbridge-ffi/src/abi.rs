//! Raw Mosquitto v5 plugin ABI
//!
//! Layouts mirror `mosquitto_broker.h` / `mosquitto_plugin.h` for plugin API
//! version 5. Only the event structs the bridge decodes are modelled; every
//! other event reaches handlers as [`EventPayload::Opaque`].
//!
//! [`EventPayload::Opaque`]: mosqbridge_core::EventPayload::Opaque

use std::ffi::{c_char, c_int, c_void};

/// `struct mosquitto` (opaque client handle owned by the broker)
#[repr(C)]
pub struct RawClient {
    _private: [u8; 0],
}

/// `mosquitto_property` (opaque MQTT v5 property list node)
#[repr(C)]
pub struct RawProperty {
    _private: [u8; 0],
}

/// `MQTT_PROP_USER_PROPERTY`
pub const MQTT_PROP_USER_PROPERTY: c_int = 38;

/// `struct mosquitto_opt`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawOption {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// `struct mosquitto_evt_message`
#[repr(C)]
#[derive(Debug)]
pub struct RawMessageEvent {
    pub future: *mut c_void,
    pub client: *mut RawClient,
    pub topic: *mut c_char,
    pub payload: *mut c_void,
    pub properties: *mut RawProperty,
    pub reason_string: *mut c_char,
    pub payloadlen: u32,
    pub qos: u8,
    pub reason_code: u8,
    pub retain: bool,
    pub future2: [*mut c_void; 4],
}

/// `struct mosquitto_evt_connect`
#[repr(C)]
#[derive(Debug)]
pub struct RawConnectEvent {
    pub future: *mut c_void,
    pub client: *mut RawClient,
    pub future2: [*mut c_void; 8],
}

/// `struct mosquitto_evt_disconnect`
#[repr(C)]
#[derive(Debug)]
pub struct RawDisconnectEvent {
    pub future: *mut c_void,
    pub client: *mut RawClient,
    pub reason: c_int,
    pub future2: [*mut c_void; 4],
}

/// `struct mosquitto_evt_basic_auth`
#[repr(C)]
#[derive(Debug)]
pub struct RawBasicAuthEvent {
    pub future: *mut c_void,
    pub client: *mut RawClient,
    pub username: *mut c_char,
    pub password: *mut c_char,
    pub future2: [*mut c_void; 4],
}

/// `MOSQ_FUNC_generic_callback`
pub type EventCallback =
    unsafe extern "C" fn(event: c_int, event_data: *mut c_void, userdata: *mut c_void) -> c_int;

/// `mosquitto_callback_register`
pub type RegisterFn = unsafe extern "C" fn(
    identifier: *mut c_void,
    event: c_int,
    cb_func: EventCallback,
    event_data: *const c_void,
    userdata: *mut c_void,
) -> c_int;

/// `mosquitto_callback_unregister`
pub type UnregisterFn = unsafe extern "C" fn(
    identifier: *mut c_void,
    event: c_int,
    cb_func: EventCallback,
    event_data: *const c_void,
) -> c_int;

/// `mosquitto_log_printf`
pub type LogPrintfFn = unsafe extern "C" fn(level: c_int, fmt: *const c_char, ...);

/// `mosquitto_client_id` / `_username` / `_address`
pub type ClientStrFn = unsafe extern "C" fn(client: *const RawClient) -> *const c_char;

/// `mosquitto_client_protocol_version`
pub type ClientIntFn = unsafe extern "C" fn(client: *const RawClient) -> c_int;

/// `mosquitto_strdup`
pub type StrdupFn = unsafe extern "C" fn(s: *const c_char) -> *mut c_char;

/// `mosquitto_malloc`
pub type MallocFn = unsafe extern "C" fn(size: usize) -> *mut c_void;

/// `mosquitto_free`
pub type FreeFn = unsafe extern "C" fn(ptr: *mut c_void);

/// `mosquitto_property_read_string_pair`
///
/// Returns the matching property (or null) and stores freshly allocated
/// copies of its name and value, which the caller frees with `mosquitto_free`.
pub type PropertyStringPairFn = unsafe extern "C" fn(
    proplist: *const RawProperty,
    identifier: c_int,
    name: *mut *mut c_char,
    value: *mut *mut c_char,
    skip_first: bool,
) -> *const RawProperty;

/// Broker functions used to read MQTT v5 properties off an event
#[derive(Debug, Clone, Copy)]
pub struct PropertyReader {
    pub read_string_pair: PropertyStringPairFn,
    pub free: FreeFn,
}

/// Broker functions used to describe the client behind an event
#[derive(Debug, Clone, Copy)]
pub struct ClientAccessors {
    pub id: ClientStrFn,
    pub username: ClientStrFn,
    pub address: ClientStrFn,
    pub protocol_version: ClientIntFn,
}

/// Broker allocator; anything stored into event structs must come from here
#[derive(Debug, Clone, Copy)]
pub struct HostAllocator {
    pub strdup: StrdupFn,
    pub malloc: MallocFn,
    pub free: FreeFn,
}
