//! Пять исходных экспортов C ABI поверх процессного движка по умолчанию.
//!
//! Движок создаётся лениво при первом вызове, конфигурация берётся из
//! окружения (`PUBSUB_*`), при ошибке используются значения по умолчанию.
//! Все функции возвращают `false` при null или невалидном UTF-8 в
//! обязательных строках.

use std::os::raw::{c_char, c_void};

use once_cell::sync::Lazy;
use tracing::warn;

use super::{
    handle::{get_next_message_on, guard, has_messages_on, publish_on, subscribe_on, unsubscribe_on},
    types::MessageCallback,
};
use crate::{config::EngineConfig, pubsub::PubSubEngine};

static DEFAULT_ENGINE: Lazy<PubSubEngine> = Lazy::new(|| {
    let config = EngineConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "invalid engine configuration, using defaults");
        EngineConfig::default()
    });
    PubSubEngine::new(config)
});

/// Движок, на котором работают экспорты этого модуля.
pub fn default_engine() -> &'static PubSubEngine {
    &DEFAULT_ENGINE
}

/// Подписывает `subscriber_id` на `topic`.
///
/// С `callback` доставка синхронная, `user_data` передаётся обратно в
/// каждый вызов без изменений. Без `callback` сообщения копятся в очереди.
/// Контекст `user_data` должен оставаться валидным до возврата
/// `unsubscribe`, снимающего подписку.
///
/// Исключение: `unsubscribe`, вызванный изнутри любого callback, не ждёт
/// вызовов снятого callback на других потоках. Освобождать `user_data`
/// после такого `unsubscribe` можно только когда хост сам знает, что
/// параллельных публикаций в эту тему нет.
#[no_mangle]
pub extern "C" fn subscribe(
    subscriber_id: *const c_char,
    topic: *const c_char,
    callback: Option<MessageCallback>,
    user_data: *mut c_void,
) -> bool {
    guard("subscribe", || unsafe {
        subscribe_on(default_engine(), subscriber_id, topic, callback, user_data)
    })
}

/// Null или пустая `topic` снимает все подписки подписчика.
#[no_mangle]
pub extern "C" fn unsubscribe(
    subscriber_id: *const c_char,
    topic: *const c_char,
) -> bool {
    guard("unsubscribe", || unsafe {
        unsubscribe_on(default_engine(), subscriber_id, topic)
    })
}

#[no_mangle]
pub extern "C" fn publish(
    topic: *const c_char,
    message: *const c_char,
) -> bool {
    guard("publish", || unsafe { publish_on(default_engine(), topic, message) })
}

/// Извлекает самое старое сообщение и копирует тему и текст в буферы
/// вызывающего (с обрезкой и NUL-терминатором). Null-буфер пропускается.
/// `false`, если сообщений нет.
#[no_mangle]
pub extern "C" fn get_next_message(
    subscriber_id: *const c_char,
    topic: *const c_char,
    out_topic: *mut c_char,
    out_topic_size: usize,
    out_message: *mut c_char,
    out_message_size: usize,
) -> bool {
    guard("get_next_message", || unsafe {
        get_next_message_on(
            default_engine(),
            subscriber_id,
            topic,
            out_topic,
            out_topic_size,
            out_message,
            out_message_size,
        )
    })
}

#[no_mangle]
pub extern "C" fn has_messages(
    subscriber_id: *const c_char,
    topic: *const c_char,
) -> bool {
    guard("has_messages", || unsafe {
        has_messages_on(default_engine(), subscriber_id, topic)
    })
}
