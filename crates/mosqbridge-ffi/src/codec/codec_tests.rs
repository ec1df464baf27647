#![allow(non_snake_case)]

use super::*;
use std::ffi::{CString, c_int};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

// Fake broker client accessors

unsafe extern "C" fn fake_id(_client: *const RawClient) -> *const c_char {
    c"sensor-1".as_ptr()
}

unsafe extern "C" fn fake_username(_client: *const RawClient) -> *const c_char {
    ptr::null()
}

unsafe extern "C" fn fake_address(_client: *const RawClient) -> *const c_char {
    c"10.0.0.7".as_ptr()
}

unsafe extern "C" fn fake_protocol(_client: *const RawClient) -> c_int {
    5
}

fn accessors() -> ClientAccessors {
    ClientAccessors {
        id: fake_id,
        username: fake_username,
        address: fake_address,
        protocol_version: fake_protocol,
    }
}

// Fake broker allocator; test memory is leaked rather than tracked

static FREED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn fake_strdup(s: *const c_char) -> *mut c_char {
    unsafe { CStr::from_ptr(s) }.to_owned().into_raw()
}

unsafe extern "C" fn fake_malloc(size: usize) -> *mut c_void {
    Box::into_raw(vec![0u8; size].into_boxed_slice()) as *mut u8 as *mut c_void
}

unsafe extern "C" fn failing_malloc(_size: usize) -> *mut c_void {
    ptr::null_mut()
}

unsafe extern "C" fn fake_free(_ptr: *mut c_void) {
    FREED.fetch_add(1, Ordering::SeqCst);
}

fn allocator() -> HostAllocator {
    HostAllocator {
        strdup: fake_strdup,
        malloc: fake_malloc,
        free: fake_free,
    }
}

// Fake broker property list: each node is one byte of USER_PROPERTIES_LIST

const USER_PROPERTIES: [(&CStr, &CStr); 2] = [(c"unit", c"celsius"), (c"site", c"north")];
static USER_PROPERTIES_LIST: [u8; 2] = [0; 2];
static PROPERTY_FREES: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn fake_read_string_pair(
    proplist: *const RawProperty,
    identifier: c_int,
    name: *mut *mut c_char,
    value: *mut *mut c_char,
    skip_first: bool,
) -> *const RawProperty {
    assert_eq!(identifier, MQTT_PROP_USER_PROPERTY);
    let base = USER_PROPERTIES_LIST.as_ptr() as usize;
    let index = proplist as usize - base + usize::from(skip_first);
    let Some((key, val)) = USER_PROPERTIES.get(index) else {
        return ptr::null();
    };
    unsafe {
        *name = CString::from(*key).into_raw();
        *value = CString::from(*val).into_raw();
    }
    (base + index) as *const RawProperty
}

unsafe extern "C" fn counting_free(_ptr: *mut c_void) {
    PROPERTY_FREES.fetch_add(1, Ordering::SeqCst);
}

fn property_reader() -> PropertyReader {
    PropertyReader {
        read_string_pair: fake_read_string_pair,
        free: counting_free,
    }
}

fn property_list() -> *mut RawProperty {
    USER_PROPERTIES_LIST.as_ptr() as *mut RawProperty
}

fn fake_client() -> *mut RawClient {
    0x1000 as *mut RawClient
}

fn message_event(topic: &CString, payload: &mut [u8]) -> RawMessageEvent {
    RawMessageEvent {
        future: ptr::null_mut(),
        client: fake_client(),
        topic: topic.as_ptr() as *mut c_char,
        payload: payload.as_mut_ptr() as *mut c_void,
        properties: ptr::null_mut(),
        reason_string: ptr::null_mut(),
        payloadlen: payload.len() as u32,
        qos: 1,
        reason_code: 0,
        retain: true,
        future2: [ptr::null_mut(); 4],
    }
}

// decode_event tests

#[test]
fn decode_event___null_data___opaque() {
    let payload = unsafe { decode_event(EventKind::Message, ptr::null_mut(), &accessors(), &[]) };

    assert_eq!(payload, EventPayload::Opaque(EventKind::Message));
}

#[test]
fn decode_event___connect___reads_client() {
    let mut raw = RawConnectEvent {
        future: ptr::null_mut(),
        client: fake_client(),
        future2: [ptr::null_mut(); 8],
    };

    let payload = unsafe {
        decode_event(
            EventKind::Connect,
            &mut raw as *mut RawConnectEvent as *mut c_void,
            &accessors(),
            &[],
        )
    };

    let client = payload.client().copied().unwrap();
    assert_eq!(payload.kind(), EventKind::Connect);
    assert_eq!(client.connection, 0x1000);
    assert_eq!(client.client_id, "sensor-1");
    assert_eq!(client.username, "");
    assert_eq!(client.peer, "10.0.0.7");
    assert_eq!(client.protocol(), "mqttv5");
}

#[test]
fn decode_event___disconnect___carries_reason() {
    let mut raw = RawDisconnectEvent {
        future: ptr::null_mut(),
        client: fake_client(),
        reason: 7,
        future2: [ptr::null_mut(); 4],
    };

    let payload = unsafe {
        decode_event(
            EventKind::Disconnect,
            &mut raw as *mut RawDisconnectEvent as *mut c_void,
            &accessors(),
            &[],
        )
    };

    assert!(matches!(payload, EventPayload::Disconnect { reason: 7, .. }));
}

#[test]
fn decode_event___message___borrows_topic_and_payload() {
    let topic = CString::new("sensors/temp").unwrap();
    let mut body = *br#"{"c":21}"#;
    let mut raw = message_event(&topic, &mut body);

    let payload = unsafe {
        decode_event(
            EventKind::Message,
            &mut raw as *mut RawMessageEvent as *mut c_void,
            &accessors(),
            &[],
        )
    };

    match payload {
        EventPayload::Message {
            client,
            topic,
            payload,
            qos,
            retain,
            user_properties,
        } => {
            assert_eq!(client.map(|c| c.client_id), Some("sensor-1"));
            assert!(user_properties.is_empty());
            assert_eq!(topic, "sensors/temp");
            assert_eq!(payload, br#"{"c":21}"#);
            assert_eq!(qos, 1);
            assert!(retain);
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn read_user_properties___message_with_properties___copies_in_order_and_frees() {
    let topic = CString::new("sensors/temp").unwrap();
    let mut body = *b"{}";
    let mut raw = message_event(&topic, &mut body);
    raw.properties = property_list();
    let frees_before = PROPERTY_FREES.load(Ordering::SeqCst);

    let properties = unsafe {
        read_user_properties(
            EventKind::Message,
            &mut raw as *mut RawMessageEvent as *mut c_void,
            &property_reader(),
        )
    };

    assert_eq!(
        properties,
        vec![
            UserProperty::new("unit", "celsius"),
            UserProperty::new("site", "north"),
        ]
    );
    assert_eq!(PROPERTY_FREES.load(Ordering::SeqCst) - frees_before, 4);
}

#[test]
fn read_user_properties___no_property_list___empty() {
    let topic = CString::new("a").unwrap();
    let mut body = *b"{}";
    let mut raw = message_event(&topic, &mut body);

    let properties = unsafe {
        read_user_properties(
            EventKind::Message,
            &mut raw as *mut RawMessageEvent as *mut c_void,
            &property_reader(),
        )
    };

    assert!(properties.is_empty());
}

#[test]
fn read_user_properties___other_kind___not_read() {
    let mut raw = RawConnectEvent {
        future: ptr::null_mut(),
        client: fake_client(),
        future2: [ptr::null_mut(); 8],
    };

    let properties = unsafe {
        read_user_properties(
            EventKind::Connect,
            &mut raw as *mut RawConnectEvent as *mut c_void,
            &property_reader(),
        )
    };

    assert!(properties.is_empty());
}

#[test]
fn decode_event___message_with_properties___attaches_them() {
    let topic = CString::new("sensors/temp").unwrap();
    let mut body = *b"{}";
    let mut raw = message_event(&topic, &mut body);
    raw.properties = property_list();
    let event_data = &mut raw as *mut RawMessageEvent as *mut c_void;

    let properties =
        unsafe { read_user_properties(EventKind::Message, event_data, &property_reader()) };
    let payload = unsafe { decode_event(EventKind::Message, event_data, &accessors(), &properties) };

    let EventPayload::Message { user_properties, .. } = payload else {
        panic!("unexpected payload {payload:?}");
    };
    assert_eq!(user_properties.len(), 2);
    assert_eq!(user_properties[1].key, "site");
}

#[test]
fn decode_event___basic_auth___reads_credentials() {
    let username = CString::new("alice").unwrap();
    let password = CString::new("hunter2").unwrap();
    let mut raw = RawBasicAuthEvent {
        future: ptr::null_mut(),
        client: ptr::null_mut(),
        username: username.as_ptr() as *mut c_char,
        password: password.as_ptr() as *mut c_char,
        future2: [ptr::null_mut(); 4],
    };

    let payload = unsafe {
        decode_event(
            EventKind::BasicAuth,
            &mut raw as *mut RawBasicAuthEvent as *mut c_void,
            &accessors(),
            &[],
        )
    };

    assert_eq!(
        payload,
        EventPayload::BasicAuth {
            client: None,
            username: "alice",
            password: "hunter2",
        }
    );
}

#[test]
fn decode_event___undecoded_kind___opaque() {
    let mut dummy = 0u8;

    let payload = unsafe {
        decode_event(
            EventKind::Tick,
            &mut dummy as *mut u8 as *mut c_void,
            &accessors(),
            &[],
        )
    };

    assert_eq!(payload, EventPayload::Opaque(EventKind::Tick));
}

// apply_message_mutation tests

#[test]
fn apply_message_mutation___topic_and_payload___replaced() {
    let topic = CString::new("in/raw").unwrap();
    let mut body = *b"old";
    let mut raw = message_event(&topic, &mut body);
    let mutation = MessageMutation {
        topic: Some("out/clean".to_string()),
        payload: Some(b"fresh!".to_vec()),
        qos: Some(0),
        retain: Some(false),
    };

    let status = unsafe {
        apply_message_mutation(
            &mut raw as *mut RawMessageEvent as *mut c_void,
            &mutation,
            &allocator(),
        )
    };

    assert_eq!(status, StatusCode::Success);
    assert_eq!(unsafe { borrow_str(raw.topic) }, "out/clean");
    let payload =
        unsafe { std::slice::from_raw_parts(raw.payload as *const u8, raw.payloadlen as usize) };
    assert_eq!(payload, b"fresh!");
    assert_eq!(raw.qos, 0);
    assert!(!raw.retain);
}

#[test]
fn apply_message_mutation___invalid_qos___leaves_event_untouched() {
    let topic = CString::new("in/raw").unwrap();
    let mut body = *b"old";
    let mut raw = message_event(&topic, &mut body);
    let original_topic = raw.topic;
    let mutation = MessageMutation {
        topic: Some("out".to_string()),
        qos: Some(3),
        ..Default::default()
    };

    let status = unsafe {
        apply_message_mutation(
            &mut raw as *mut RawMessageEvent as *mut c_void,
            &mutation,
            &allocator(),
        )
    };

    assert_eq!(status, StatusCode::Inval);
    assert_eq!(raw.topic, original_topic);
    assert_eq!(raw.qos, 1);
}

#[test]
fn apply_message_mutation___topic_with_nul___inval() {
    let topic = CString::new("in").unwrap();
    let mut body = *b"x";
    let mut raw = message_event(&topic, &mut body);
    let mutation = MessageMutation {
        topic: Some("bad\0topic".to_string()),
        ..Default::default()
    };

    let status = unsafe {
        apply_message_mutation(
            &mut raw as *mut RawMessageEvent as *mut c_void,
            &mutation,
            &allocator(),
        )
    };

    assert_eq!(status, StatusCode::Inval);
}

#[test]
fn apply_message_mutation___allocation_failure___no_mem() {
    let topic = CString::new("in").unwrap();
    let mut body = *b"x";
    let mut raw = message_event(&topic, &mut body);
    let original_topic = raw.topic;
    let original_payload = raw.payload;
    let mutation = MessageMutation {
        topic: Some("out".to_string()),
        payload: Some(b"bigger".to_vec()),
        qos: Some(0),
        retain: Some(false),
    };
    let allocator = HostAllocator {
        malloc: failing_malloc,
        ..allocator()
    };

    let status = unsafe {
        apply_message_mutation(
            &mut raw as *mut RawMessageEvent as *mut c_void,
            &mutation,
            &allocator,
        )
    };

    assert_eq!(status, StatusCode::NoMem);
    assert_eq!(raw.topic, original_topic);
    assert_eq!(unsafe { borrow_str(raw.topic) }, "in");
    assert_eq!(raw.payload, original_payload);
    assert_eq!(raw.payloadlen, 1);
    assert_eq!(raw.qos, 1);
    assert!(raw.retain);
}

#[test]
fn apply_message_mutation___null_event___inval() {
    let status = unsafe {
        apply_message_mutation(ptr::null_mut(), &MessageMutation::default(), &allocator())
    };

    assert_eq!(status, StatusCode::Inval);
}
