//! Экспортируемые функции, работающие с явным [`PubSubHandle`], и общая
//! реализация операций на границе.
//!
//! Любая функция здесь:
//!
//! * проверяет указатели на null до разыменования;
//! * перехватывает панику через [`std::panic::catch_unwind`], паника не
//!   пересекает границу;
//! * при ошибке возвращает `false` и сохраняет описание и код в
//!   thread-local, откуда их читают [`pubsub_last_error`] и
//!   [`pubsub_last_error_code`].

use std::{
    cell::RefCell,
    ffi::{CStr, CString},
    os::raw::{c_char, c_void},
    panic::{catch_unwind, AssertUnwindSafe},
};

use pubsub_error::{BoundaryError, LogLevel, PubSubResult, StackError, StatusCode};
use tracing::{debug, error, info, warn};

use super::{
    marshal::marshal_to_raw,
    types::{ForeignHandler, MessageCallback, PubSubHandle},
};
use crate::{
    config::EngineConfig,
    pubsub::{CallbackHandle, PubSubEngine},
};

thread_local! {
    static LAST_ERROR: RefCell<Option<(StatusCode, CString)>> = const { RefCell::new(None) };
}

fn set_last_error(
    code: StatusCode,
    msg: &str,
) {
    let c = super::types::to_c_string(msg);
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some((code, c)));
}

fn clear_last_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Сохраняет ошибку и пишет её в лог на уровне, заданном её кодом.
fn fail(
    op: &'static str,
    err: &StackError,
) -> bool {
    let code = err.status_code();
    set_last_error(code, &err.to_string());
    match err.log_level() {
        LogLevel::Error => error!(op, %code, error = %err, "ffi call failed"),
        LogLevel::Warn => warn!(op, %code, error = %err, "ffi call failed"),
        LogLevel::Info => info!(op, %code, error = %err, "ffi call failed"),
        LogLevel::Debug => debug!(op, %code, error = %err, "ffi call failed"),
    }
    false
}

/// Выполняет тело под `catch_unwind` и сводит результат к `bool`.
pub(crate) fn guard<F>(
    op: &'static str,
    f: F,
) -> bool
where
    F: FnOnce() -> PubSubResult<bool>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(done)) => {
            clear_last_error();
            done
        }
        Ok(Err(e)) => fail(op, &e),
        Err(_) => {
            set_last_error(StatusCode::Internal, "panic inside pubsub call");
            error!(op, "panic caught at ffi boundary");
            false
        }
    }
}

/// Обязательная строка: null и невалидный UTF-8 отклоняются.
///
/// # Safety
///
/// Ненулевой `ptr` указывает на NUL-терминированную строку.
pub(crate) unsafe fn cstr_to_str<'a>(
    ptr: *const c_char,
    what: &'static str,
) -> PubSubResult<&'a str> {
    if ptr.is_null() {
        pubsub_error::bail!(BoundaryError::NullPointer { what });
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().map_err(|e| {
        BoundaryError::InvalidUtf8 {
            what,
            valid_up_to: e.valid_up_to(),
        }
        .into()
    })
}

/// Необязательная строка: null означает `None`.
///
/// # Safety
///
/// Как у [`cstr_to_str`].
pub(crate) unsafe fn opt_cstr_to_str<'a>(
    ptr: *const c_char,
    what: &'static str,
) -> PubSubResult<Option<&'a str>> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { cstr_to_str(ptr, what) }.map(Some)
}

/// # Safety
///
/// Ненулевой `handle` получен из [`pubsub_engine_new`] и ещё не освобождён.
unsafe fn deref_handle<'a>(handle: *mut PubSubHandle) -> PubSubResult<&'a PubSubEngine> {
    if handle.is_null() {
        pubsub_error::bail!(BoundaryError::NullPointer {
            what: "engine handle"
        });
    }
    Ok(unsafe { &*handle }.engine())
}

////////////////////////////////////////////////////////////////////////////////
// Общая реализация операций
//
// Safety для всех `*_on`: ненулевые строковые указатели указывают на
// NUL-терминированные строки, выходные буферы доступны для записи на
// заявленную ёмкость.
////////////////////////////////////////////////////////////////////////////////

pub(crate) unsafe fn subscribe_on(
    engine: &PubSubEngine,
    subscriber_id: *const c_char,
    topic: *const c_char,
    callback: Option<MessageCallback>,
    user_data: *mut c_void,
) -> PubSubResult<bool> {
    let subscriber = unsafe { cstr_to_str(subscriber_id, "subscriber_id") }?;
    let topic = unsafe { cstr_to_str(topic, "topic") }?;
    let handle = callback.map(|cb| CallbackHandle::new(ForeignHandler::new(cb, user_data)));
    engine.subscribe(subscriber, topic, handle)?;
    Ok(true)
}

pub(crate) unsafe fn unsubscribe_on(
    engine: &PubSubEngine,
    subscriber_id: *const c_char,
    topic: *const c_char,
) -> PubSubResult<bool> {
    let subscriber = unsafe { cstr_to_str(subscriber_id, "subscriber_id") }?;
    let topic = unsafe { opt_cstr_to_str(topic, "topic") }?;
    engine.unsubscribe(subscriber, topic)?;
    Ok(true)
}

pub(crate) unsafe fn publish_on(
    engine: &PubSubEngine,
    topic: *const c_char,
    message: *const c_char,
) -> PubSubResult<bool> {
    let topic = unsafe { cstr_to_str(topic, "topic") }?;
    let message = unsafe { cstr_to_str(message, "message") }?;
    engine.publish(topic, message)?;
    Ok(true)
}

pub(crate) unsafe fn get_next_message_on(
    engine: &PubSubEngine,
    subscriber_id: *const c_char,
    topic: *const c_char,
    out_topic: *mut c_char,
    out_topic_size: usize,
    out_message: *mut c_char,
    out_message_size: usize,
) -> PubSubResult<bool> {
    let subscriber = unsafe { cstr_to_str(subscriber_id, "subscriber_id") }?;
    let topic = unsafe { opt_cstr_to_str(topic, "topic") }?;

    let Some(msg) = engine.get_next_message(subscriber, topic) else {
        return Ok(false);
    };

    let t = unsafe { marshal_to_raw(msg.topic(), out_topic, out_topic_size) };
    let m = unsafe { marshal_to_raw(msg.content(), out_message, out_message_size) };
    if t.is_some_and(|r| r.truncated) || m.is_some_and(|r| r.truncated) {
        debug!(
            subscriber,
            topic = msg.topic(),
            topic_len = msg.topic().len(),
            message_len = msg.content().len(),
            "output truncated to caller buffer"
        );
    }
    Ok(true)
}

pub(crate) unsafe fn has_messages_on(
    engine: &PubSubEngine,
    subscriber_id: *const c_char,
    topic: *const c_char,
) -> PubSubResult<bool> {
    let subscriber = unsafe { cstr_to_str(subscriber_id, "subscriber_id") }?;
    let topic = unsafe { opt_cstr_to_str(topic, "topic") }?;
    Ok(engine.has_messages(subscriber, topic))
}

////////////////////////////////////////////////////////////////////////////////
// Жизненный цикл
////////////////////////////////////////////////////////////////////////////////

/// Создаёт новый независимый экземпляр движка с конфигурацией из
/// окружения (`PUBSUB_*`). При ошибке возвращает null.
#[no_mangle]
pub extern "C" fn pubsub_engine_new() -> *mut PubSubHandle {
    catch_unwind(|| match EngineConfig::load() {
        Ok(config) => PubSubHandle::into_raw(PubSubEngine::new(config)),
        Err(e) => {
            set_last_error(StatusCode::InvalidConfig, &e.to_string());
            warn!(error = %e, "invalid engine configuration");
            std::ptr::null_mut()
        }
    })
    .unwrap_or_else(|_| {
        set_last_error(StatusCode::Internal, "panic during pubsub_engine_new");
        std::ptr::null_mut()
    })
}

/// Освобождает экземпляр. После вызова хендл использовать нельзя.
///
/// # Safety
///
/// `handle` получен из [`pubsub_engine_new`] и освобождается один раз, когда
/// ни один поток больше не работает с ним.
#[no_mangle]
pub extern "C" fn pubsub_engine_free(handle: *mut PubSubHandle) {
    if handle.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe { PubSubHandle::free(handle) }));
}

////////////////////////////////////////////////////////////////////////////////
// Операции над хендлом
////////////////////////////////////////////////////////////////////////////////

/// Как [`subscribe`](super::subscribe), но на явном экземпляре.
#[no_mangle]
pub extern "C" fn pubsub_engine_subscribe(
    handle: *mut PubSubHandle,
    subscriber_id: *const c_char,
    topic: *const c_char,
    callback: Option<MessageCallback>,
    user_data: *mut c_void,
) -> bool {
    guard("pubsub_engine_subscribe", || {
        let engine = unsafe { deref_handle(handle) }?;
        unsafe { subscribe_on(engine, subscriber_id, topic, callback, user_data) }
    })
}

#[no_mangle]
pub extern "C" fn pubsub_engine_unsubscribe(
    handle: *mut PubSubHandle,
    subscriber_id: *const c_char,
    topic: *const c_char,
) -> bool {
    guard("pubsub_engine_unsubscribe", || {
        let engine = unsafe { deref_handle(handle) }?;
        unsafe { unsubscribe_on(engine, subscriber_id, topic) }
    })
}

#[no_mangle]
pub extern "C" fn pubsub_engine_publish(
    handle: *mut PubSubHandle,
    topic: *const c_char,
    message: *const c_char,
) -> bool {
    guard("pubsub_engine_publish", || {
        let engine = unsafe { deref_handle(handle) }?;
        unsafe { publish_on(engine, topic, message) }
    })
}

#[no_mangle]
pub extern "C" fn pubsub_engine_get_next_message(
    handle: *mut PubSubHandle,
    subscriber_id: *const c_char,
    topic: *const c_char,
    out_topic: *mut c_char,
    out_topic_size: usize,
    out_message: *mut c_char,
    out_message_size: usize,
) -> bool {
    guard("pubsub_engine_get_next_message", || {
        let engine = unsafe { deref_handle(handle) }?;
        unsafe {
            get_next_message_on(
                engine,
                subscriber_id,
                topic,
                out_topic,
                out_topic_size,
                out_message,
                out_message_size,
            )
        }
    })
}

#[no_mangle]
pub extern "C" fn pubsub_engine_has_messages(
    handle: *mut PubSubHandle,
    subscriber_id: *const c_char,
    topic: *const c_char,
) -> bool {
    guard("pubsub_engine_has_messages", || {
        let engine = unsafe { deref_handle(handle) }?;
        unsafe { has_messages_on(engine, subscriber_id, topic) }
    })
}

/// Описание последней ошибки на текущем потоке или null.
///
/// Указатель валиден до следующего вызова любой функции этого API на том
/// же потоке.
#[no_mangle]
pub extern "C" fn pubsub_last_error() -> *const c_char {
    LAST_ERROR.with(|cell| {
        cell.borrow()
            .as_ref()
            .map_or(std::ptr::null(), |(_, s)| s.as_ptr())
    })
}

/// Код последней ошибки на текущем потоке ([`StatusCode`]) или `0`, если
/// последний вызов завершился без ошибки.
#[no_mangle]
pub extern "C" fn pubsub_last_error_code() -> u32 {
    LAST_ERROR.with(|cell| cell.borrow().as_ref().map_or(0, |(code, _)| code.code()))
}
