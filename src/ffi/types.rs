use std::{
    ffi::CString,
    os::raw::{c_char, c_void},
};

use crate::pubsub::{MessageHandler, PubSubEngine};

/// Обработчик на стороне C: `(topic, message, user_data)`.
///
/// Строки валидны только на время вызова.
pub type MessageCallback =
    extern "C" fn(topic: *const c_char, message: *const c_char, user_data: *mut c_void);

/// Непрозрачный контекст вызывающей стороны. Движок только передаёт его
/// обратно в callback.
#[derive(Debug, Clone, Copy)]
struct UserData(*mut c_void);

// SAFETY: указатель никогда не разыменовывается на стороне Rust. За
// потокобезопасность данных за ним отвечает вызывающая сторона, которая
// обязана держать их живыми до возврата `unsubscribe` (с оговоркой для
// `unsubscribe` изнутри callback, см. `subscribe`).
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// Пара (callback, user_data), обёрнутая в [`MessageHandler`].
#[derive(Debug)]
pub(crate) struct ForeignHandler {
    callback: MessageCallback,
    user_data: UserData,
}

impl ForeignHandler {
    pub(crate) fn new(
        callback: MessageCallback,
        user_data: *mut c_void,
    ) -> Self {
        Self {
            callback,
            user_data: UserData(user_data),
        }
    }
}

impl MessageHandler for ForeignHandler {
    fn on_message(
        &self,
        topic: &str,
        content: &str,
    ) {
        let topic = to_c_string(topic);
        let content = to_c_string(content);
        (self.callback)(topic.as_ptr(), content.as_ptr(), self.user_data.0);
    }
}

/// Строка для C. Всё после первого внутреннего NUL отбрасывается: C всё
/// равно его не увидит.
pub(crate) fn to_c_string(s: &str) -> CString {
    let end = s.find('\0').unwrap_or(s.len());
    CString::new(&s[..end]).unwrap_or_default()
}

/// Непрозрачный хендл экземпляра движка.
///
/// Создаётся [`pubsub_engine_new`](super::pubsub_engine_new), освобождается
/// [`pubsub_engine_free`](super::pubsub_engine_free). Один хендл можно
/// использовать из нескольких потоков одновременно.
pub struct PubSubHandle {
    engine: PubSubEngine,
}

impl PubSubHandle {
    pub(crate) fn into_raw(engine: PubSubEngine) -> *mut Self {
        Box::into_raw(Box::new(Self { engine }))
    }

    pub(crate) fn engine(&self) -> &PubSubEngine {
        &self.engine
    }

    /// # Safety
    ///
    /// `ptr` получен из [`PubSubHandle::into_raw`] и ещё не освобождён.
    pub(crate) unsafe fn free(ptr: *mut Self) {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

#[cfg(test)]
mod tests {
    use std::{ffi::CStr, sync::Mutex};

    use super::*;

    static SEEN: Mutex<Vec<(String, String, usize)>> = Mutex::new(Vec::new());

    extern "C" fn record(
        topic: *const c_char,
        message: *const c_char,
        user_data: *mut c_void,
    ) {
        let topic = unsafe { CStr::from_ptr(topic) }.to_string_lossy().into_owned();
        let message = unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned();
        SEEN.lock().unwrap().push((topic, message, user_data as usize));
    }

    /// Тест проверяет, что user_data возвращается в callback без изменений.
    #[test]
    fn test_foreign_handler_passes_user_data_through() {
        let handler = ForeignHandler::new(record, 0xBEEF as *mut c_void);
        handler.on_message("news", "m1");

        let seen = SEEN.lock().unwrap();
        assert!(seen.contains(&("news".to_string(), "m1".to_string(), 0xBEEF)));
    }

    #[test]
    fn test_to_c_string_cuts_at_interior_nul() {
        assert_eq!(to_c_string("ab\0cd").as_bytes(), b"ab");
        assert_eq!(to_c_string("plain").as_bytes(), b"plain");
    }
}
