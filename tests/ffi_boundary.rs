use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_void},
    ptr,
    sync::Mutex,
};

use pubsub_core::ffi::{
    self, pubsub_engine_free, pubsub_engine_get_next_message, pubsub_engine_has_messages,
    pubsub_engine_new, pubsub_engine_publish, pubsub_engine_subscribe, pubsub_engine_unsubscribe,
    pubsub_last_error, pubsub_last_error_code, MAX_MESSAGE_SIZE, MAX_TOPIC_SIZE,
};
use pubsub_core::StatusCode;
use serial_test::serial;

type Received = Mutex<Vec<(String, String)>>;

extern "C" fn collect(
    topic: *const c_char,
    message: *const c_char,
    user_data: *mut c_void,
) {
    let received = unsafe { &*(user_data as *const Received) };
    let topic = unsafe { CStr::from_ptr(topic) }.to_str().unwrap().to_string();
    let message = unsafe { CStr::from_ptr(message) }.to_str().unwrap().to_string();
    received.lock().unwrap().push((topic, message));
}

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

fn user_data(received: &Received) -> *mut c_void {
    received as *const Received as *mut c_void
}

/// Извлекает сообщение через legacy-экспорт в буферы заданной ёмкости.
fn next_message(
    subscriber: &CStr,
    topic: Option<&CStr>,
    topic_cap: usize,
    message_cap: usize,
) -> Option<(String, String)> {
    let mut t = vec![0 as c_char; topic_cap];
    let mut m = vec![0 as c_char; message_cap];
    let ok = ffi::get_next_message(
        subscriber.as_ptr(),
        topic.map_or(ptr::null(), CStr::as_ptr),
        t.as_mut_ptr(),
        t.len(),
        m.as_mut_ptr(),
        m.len(),
    );
    if !ok {
        return None;
    }
    let read = |buf: &[c_char]| unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap().to_string();
    Some((read(&t), read(&m)))
}

/// Тест проверяет сценарий через пять экспортов движка по умолчанию.
#[test]
#[serial]
fn test_legacy_exports_scenario() {
    let received: Received = Mutex::new(Vec::new());
    let (sub1, sub2, news) = (c("ffi-subscriber1"), c("ffi-subscriber2"), c("ffi-news"));

    assert!(ffi::subscribe(sub1.as_ptr(), news.as_ptr(), Some(collect), user_data(&received)));
    assert!(ffi::subscribe(sub2.as_ptr(), news.as_ptr(), None, ptr::null_mut()));

    for m in ["m1", "m2"] {
        assert!(ffi::publish(news.as_ptr(), c(m).as_ptr()));
    }
    assert_eq!(received.lock().unwrap().len(), 2);
    assert_eq!(received.lock().unwrap()[1], ("ffi-news".to_string(), "m2".to_string()));

    assert!(ffi::has_messages(sub2.as_ptr(), ptr::null()));
    assert_eq!(
        next_message(&sub2, Some(&news), MAX_TOPIC_SIZE, MAX_MESSAGE_SIZE),
        Some(("ffi-news".to_string(), "m1".to_string()))
    );
    assert_eq!(
        next_message(&sub2, None, MAX_TOPIC_SIZE, MAX_MESSAGE_SIZE).map(|(_, m)| m),
        Some("m2".to_string())
    );
    assert!(!ffi::has_messages(sub2.as_ptr(), news.as_ptr()));
    assert!(next_message(&sub2, None, MAX_TOPIC_SIZE, MAX_MESSAGE_SIZE).is_none());

    assert!(ffi::unsubscribe(sub1.as_ptr(), news.as_ptr()));
    assert!(ffi::publish(news.as_ptr(), c("m3").as_ptr()));
    assert_eq!(received.lock().unwrap().len(), 2);
    assert!(ffi::has_messages(sub2.as_ptr(), news.as_ptr()));

    // пустая строка: wildcard
    assert!(ffi::unsubscribe(sub2.as_ptr(), c("").as_ptr()));
    assert!(!ffi::has_messages(sub2.as_ptr(), ptr::null()));
}

/// Тест проверяет отказ при null и невалидном UTF-8 в обязательных строках.
#[test]
#[serial]
fn test_null_and_invalid_utf8_are_rejected() {
    let topic = c("ffi-invalid");
    let bad = CString::new(vec![0xffu8, 0xfe]).unwrap();

    assert!(!ffi::subscribe(ptr::null(), topic.as_ptr(), None, ptr::null_mut()));
    assert!(!ffi::subscribe(c("s").as_ptr(), ptr::null(), None, ptr::null_mut()));
    assert!(!ffi::subscribe(bad.as_ptr(), topic.as_ptr(), None, ptr::null_mut()));
    assert!(!ffi::publish(ptr::null(), c("m").as_ptr()));
    assert!(!ffi::publish(topic.as_ptr(), ptr::null()));
    assert!(!ffi::publish(topic.as_ptr(), bad.as_ptr()));
    assert!(!ffi::unsubscribe(ptr::null(), ptr::null()));
    assert!(!ffi::has_messages(ptr::null(), ptr::null()));

    let err = unsafe { CStr::from_ptr(pubsub_last_error()) }.to_str().unwrap();
    assert!(err.contains("subscriber_id pointer is null"), "{err}");
    assert_eq!(pubsub_last_error_code(), StatusCode::NullPointer.code());

    assert!(!ffi::publish(topic.as_ptr(), bad.as_ptr()));
    assert_eq!(pubsub_last_error_code(), StatusCode::InvalidUtf8.code());
}

/// Тест проверяет отказ при пустой теме в subscribe/publish.
#[test]
#[serial]
fn test_empty_topic_is_rejected_for_subscribe_and_publish() {
    let empty = c("");
    assert!(!ffi::subscribe(c("s").as_ptr(), empty.as_ptr(), None, ptr::null_mut()));
    assert!(!ffi::publish(empty.as_ptr(), c("m").as_ptr()));
    assert!(!pubsub_last_error().is_null());
    assert_eq!(pubsub_last_error_code(), StatusCode::InvalidTopic.code());

    assert!(ffi::publish(c("ffi-empty-ok").as_ptr(), c("m").as_ptr()));
    assert!(pubsub_last_error().is_null());
    assert_eq!(pubsub_last_error_code(), 0);
}

/// Тест проверяет, что отписка несуществующей подписки через C ABI
/// успешна, в том числе на явном экземпляре.
#[test]
#[serial]
fn test_unsubscribe_unknown_returns_true() {
    let (ghost, topic) = (c("ffi-ghost"), c("ffi-ghost-topic"));
    assert!(ffi::unsubscribe(ghost.as_ptr(), topic.as_ptr()));
    assert!(ffi::unsubscribe(ghost.as_ptr(), ptr::null()));
    assert!(ffi::unsubscribe(ghost.as_ptr(), c("").as_ptr()));
    assert_eq!(pubsub_last_error_code(), 0);

    let engine = pubsub_engine_new();
    assert!(pubsub_engine_unsubscribe(engine, ghost.as_ptr(), topic.as_ptr()));
    assert!(pubsub_engine_unsubscribe(engine, ghost.as_ptr(), ptr::null()));
    pubsub_engine_free(engine);
}

/// Тест проверяет обрезку вывода: сообщение потребляется, в буфере
/// префикс с терминатором.
#[test]
#[serial]
fn test_truncated_output_still_consumes_message() {
    let (sub, topic) = (c("ffi-trunc"), c("ffi-trunc-topic"));
    assert!(ffi::subscribe(sub.as_ptr(), topic.as_ptr(), None, ptr::null_mut()));
    assert!(ffi::publish(topic.as_ptr(), c("hello world").as_ptr()));

    assert_eq!(
        next_message(&sub, None, 4, 6),
        Some(("ffi".to_string(), "hello".to_string()))
    );
    assert!(!ffi::has_messages(sub.as_ptr(), ptr::null()));
    assert!(ffi::unsubscribe(sub.as_ptr(), ptr::null()));
}

/// Тест проверяет, что null-буферы пропускаются, а сообщение всё равно
/// извлекается.
#[test]
#[serial]
fn test_null_output_buffers_are_skipped() {
    let (sub, topic) = (c("ffi-nullbuf"), c("ffi-nullbuf-topic"));
    assert!(ffi::subscribe(sub.as_ptr(), topic.as_ptr(), None, ptr::null_mut()));
    assert!(ffi::publish(topic.as_ptr(), c("x").as_ptr()));

    assert!(ffi::get_next_message(
        sub.as_ptr(),
        ptr::null(),
        ptr::null_mut(),
        MAX_TOPIC_SIZE,
        ptr::null_mut(),
        0,
    ));
    assert!(!ffi::has_messages(sub.as_ptr(), ptr::null()));
    assert!(ffi::unsubscribe(sub.as_ptr(), ptr::null()));
}

/// Тест проверяет handle API: экземпляры изолированы друг от друга и от
/// движка по умолчанию.
#[test]
fn test_handle_api_isolated_instances() {
    let a = pubsub_engine_new();
    let b = pubsub_engine_new();
    assert!(!a.is_null() && !b.is_null());

    let received: Received = Mutex::new(Vec::new());
    let (sub, q, topic) = (c("h-sub"), c("h-queue"), c("h-topic"));

    assert!(pubsub_engine_subscribe(a, sub.as_ptr(), topic.as_ptr(), Some(collect), user_data(&received)));
    assert!(pubsub_engine_subscribe(a, q.as_ptr(), topic.as_ptr(), None, ptr::null_mut()));
    assert!(pubsub_engine_publish(b, topic.as_ptr(), c("to b").as_ptr()));
    assert!(pubsub_engine_publish(a, topic.as_ptr(), c("to a").as_ptr()));

    assert_eq!(*received.lock().unwrap(), vec![("h-topic".to_string(), "to a".to_string())]);
    assert!(pubsub_engine_has_messages(a, q.as_ptr(), ptr::null()));
    assert!(!pubsub_engine_has_messages(b, q.as_ptr(), ptr::null()));

    let mut out = vec![0 as c_char; MAX_MESSAGE_SIZE];
    assert!(pubsub_engine_get_next_message(
        a,
        q.as_ptr(),
        topic.as_ptr(),
        ptr::null_mut(),
        0,
        out.as_mut_ptr(),
        out.len(),
    ));
    assert_eq!(unsafe { CStr::from_ptr(out.as_ptr()) }.to_str().unwrap(), "to a");

    assert!(pubsub_engine_unsubscribe(a, sub.as_ptr(), ptr::null()));
    assert!(pubsub_engine_unsubscribe(a, q.as_ptr(), ptr::null()));
    pubsub_engine_free(a);
    pubsub_engine_free(b);
}

/// Тест проверяет, что null-хендл даёт false, а освобождение null ничего
/// не делает.
#[test]
fn test_null_handle() {
    let topic = c("t");
    assert!(!pubsub_engine_publish(ptr::null_mut(), topic.as_ptr(), topic.as_ptr()));
    assert!(!pubsub_engine_has_messages(ptr::null_mut(), topic.as_ptr(), ptr::null()));
    assert_eq!(pubsub_last_error_code(), StatusCode::NullPointer.code());
    let err = unsafe { CStr::from_ptr(pubsub_last_error()) }.to_str().unwrap();
    assert_eq!(err, "engine handle pointer is null");
    pubsub_engine_free(ptr::null_mut());
}
