//! Conversion between raw broker event data and [`EventPayload`]

use crate::abi::{
    ClientAccessors, HostAllocator, MQTT_PROP_USER_PROPERTY, PropertyReader, RawBasicAuthEvent,
    RawClient, RawConnectEvent, RawDisconnectEvent, RawMessageEvent, RawProperty,
};
use mosqbridge_core::{
    ClientInfo, EventKind, EventPayload, MessageMutation, StatusCode, UserProperty,
};
use std::ffi::{CStr, CString, c_char, c_void};

/// Borrow a broker C string; null or non-UTF-8 becomes `""`
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn borrow_str<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "";
    }
    // SAFETY: non-null, caller guarantees NUL-terminated and alive for 'a
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("")
}

/// Describe the client behind a raw handle
///
/// # Safety
/// `client` must be a live broker client handle for the duration of `'a`.
pub unsafe fn client_info<'a>(
    client: *const RawClient,
    accessors: &ClientAccessors,
) -> ClientInfo<'a> {
    // SAFETY: caller guarantees client is live; accessors are broker functions
    unsafe {
        ClientInfo {
            connection: client as usize,
            client_id: borrow_str((accessors.id)(client)),
            username: borrow_str((accessors.username)(client)),
            peer: borrow_str((accessors.address)(client)),
            protocol_version: (accessors.protocol_version)(client),
        }
    }
}

unsafe fn optional_client<'a>(
    client: *const RawClient,
    accessors: &ClientAccessors,
) -> Option<ClientInfo<'a>> {
    // SAFETY: forwarded from the caller
    (!client.is_null()).then(|| unsafe { client_info(client, accessors) })
}

/// Take ownership of a string the broker allocated for us
///
/// # Safety
/// `ptr` must be null or a NUL-terminated string allocated by the broker.
unsafe fn take_str(ptr: *mut c_char, reader: &PropertyReader) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: non-null broker string, freed right after the copy
    unsafe {
        let owned = CStr::from_ptr(ptr).to_string_lossy().into_owned();
        (reader.free)(ptr as *mut c_void);
        owned
    }
}

/// Copy the MQTT v5 user properties of a message event, in wire order
///
/// Every other kind, null event data and messages without properties give
/// an empty list.
///
/// # Safety
/// `event_data` must be null or point to the broker struct matching `kind`.
pub unsafe fn read_user_properties(
    kind: EventKind,
    event_data: *mut c_void,
    reader: &PropertyReader,
) -> Vec<UserProperty> {
    if kind != EventKind::Message || event_data.is_null() {
        return Vec::new();
    }
    // SAFETY: caller guarantees a message event
    let list: *const RawProperty = unsafe { (*(event_data as *const RawMessageEvent)).properties };
    if list.is_null() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut skip_first = false;
    let mut cursor = list;
    loop {
        let mut name: *mut c_char = std::ptr::null_mut();
        let mut value: *mut c_char = std::ptr::null_mut();
        // SAFETY: cursor is the list head or a node the broker returned
        let found = unsafe {
            (reader.read_string_pair)(cursor, MQTT_PROP_USER_PROPERTY, &mut name, &mut value, skip_first)
        };
        if found.is_null() {
            break;
        }
        // SAFETY: both strings were allocated for us by the read above
        let (key, value) = unsafe { (take_str(name, reader), take_str(value, reader)) };
        out.push(UserProperty { key, value });
        cursor = found;
        skip_first = true;
    }
    out
}

/// Decode the event data the broker passed to a callback
///
/// Kinds without a modelled layout, and null event data, decode to
/// [`EventPayload::Opaque`]. `user_properties` is attached to message events
/// as-is; see [`read_user_properties`].
///
/// # Safety
/// `event_data` must be null or point to the broker struct matching `kind`,
/// valid for `'a`.
pub unsafe fn decode_event<'a>(
    kind: EventKind,
    event_data: *mut c_void,
    accessors: &ClientAccessors,
    user_properties: &'a [UserProperty],
) -> EventPayload<'a> {
    if event_data.is_null() {
        return EventPayload::Opaque(kind);
    }

    // SAFETY: caller guarantees the layout matches the kind
    unsafe {
        match kind {
            EventKind::Connect => {
                let raw = &*(event_data as *const RawConnectEvent);
                if raw.client.is_null() {
                    return EventPayload::Opaque(kind);
                }
                EventPayload::Connect {
                    client: client_info(raw.client, accessors),
                }
            }
            EventKind::Disconnect => {
                let raw = &*(event_data as *const RawDisconnectEvent);
                if raw.client.is_null() {
                    return EventPayload::Opaque(kind);
                }
                EventPayload::Disconnect {
                    client: client_info(raw.client, accessors),
                    reason: raw.reason,
                }
            }
            EventKind::Message => {
                let raw = &*(event_data as *const RawMessageEvent);
                let payload = if raw.payload.is_null() || raw.payloadlen == 0 {
                    &[][..]
                } else {
                    std::slice::from_raw_parts(raw.payload as *const u8, raw.payloadlen as usize)
                };
                EventPayload::Message {
                    client: optional_client(raw.client, accessors),
                    topic: borrow_str(raw.topic),
                    payload,
                    qos: raw.qos,
                    retain: raw.retain,
                    user_properties,
                }
            }
            EventKind::BasicAuth => {
                let raw = &*(event_data as *const RawBasicAuthEvent);
                EventPayload::BasicAuth {
                    client: optional_client(raw.client, accessors),
                    username: borrow_str(raw.username),
                    password: borrow_str(raw.password),
                }
            }
            other => EventPayload::Opaque(other),
        }
    }
}

/// Write a handler's message mutation back into the broker's event struct
///
/// Replaced buffers are allocated with the broker allocator and the old ones
/// freed with it, since the broker frees them after the callback.
///
/// # Safety
/// `event_data` must point to a live `mosquitto_evt_message` whose topic and
/// payload were allocated by `allocator`.
pub unsafe fn apply_message_mutation(
    event_data: *mut c_void,
    mutation: &MessageMutation,
    allocator: &HostAllocator,
) -> StatusCode {
    if event_data.is_null() {
        return StatusCode::Inval;
    }
    // SAFETY: caller guarantees a live message event
    let raw = unsafe { &mut *(event_data as *mut RawMessageEvent) };

    // Validate everything up front so a rejected mutation changes nothing
    if mutation.qos.is_some_and(|qos| qos > 2) {
        return StatusCode::Inval;
    }
    let topic = match mutation.topic.as_deref().map(CString::new) {
        Some(Ok(topic)) => Some(topic),
        Some(Err(_)) => return StatusCode::Inval,
        None => None,
    };
    let payload = match mutation.payload.as_deref() {
        Some(bytes) => match u32::try_from(bytes.len()) {
            Ok(len) => Some((bytes, len)),
            Err(_) => return StatusCode::Inval,
        },
        None => None,
    };

    // Allocate every replacement before touching the event, so a failed
    // allocation leaves it exactly as the broker handed it over
    let new_topic = match &topic {
        Some(topic) => {
            // SAFETY: strdup copies the string into broker-owned memory
            let copy = unsafe { (allocator.strdup)(topic.as_ptr()) };
            if copy.is_null() {
                return StatusCode::NoMem;
            }
            Some(copy)
        }
        None => None,
    };
    let new_payload = match payload {
        Some((bytes, len)) if bytes.is_empty() => Some((std::ptr::null_mut(), len)),
        Some((bytes, len)) => {
            // SAFETY: plain allocation, checked for null below
            let buffer = unsafe { (allocator.malloc)(bytes.len()) };
            if buffer.is_null() {
                if let Some(copy) = new_topic {
                    // SAFETY: allocated by strdup above and not yet installed
                    unsafe { (allocator.free)(copy as *mut c_void) };
                }
                return StatusCode::NoMem;
            }
            // SAFETY: buffer holds bytes.len() bytes and does not overlap
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer as *mut u8, bytes.len()) };
            Some((buffer, len))
        }
        None => None,
    };

    if let Some(copy) = new_topic {
        // SAFETY: old topic came from the broker allocator
        unsafe { (allocator.free)(raw.topic as *mut c_void) };
        raw.topic = copy;
    }
    if let Some((buffer, len)) = new_payload {
        // SAFETY: old payload came from the broker allocator
        unsafe { (allocator.free)(raw.payload) };
        raw.payload = buffer;
        raw.payloadlen = len;
    }

    if let Some(qos) = mutation.qos {
        raw.qos = qos;
    }
    if let Some(retain) = mutation.retain {
        raw.retain = retain;
    }

    StatusCode::Success
}

#[cfg(test)]
#[path = "codec/codec_tests.rs"]
mod codec_tests;
