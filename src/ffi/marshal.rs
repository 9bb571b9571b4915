//! Перенос текста в буферы фиксированной ёмкости, принадлежащие вызывающей
//! стороне.
//!
//! Контракт: в буфер ёмкостью `N` пишется не более `N - 1` байт и всегда
//! ставится NUL-терминатор; за пределы буфера запись не выходит. Обрезка
//! отступает до границы UTF-8 символа, так что результат остаётся валидной
//! UTF-8 строкой.

use std::os::raw::c_char;

/// Рекомендуемая ёмкость буфера под тему (включая терминатор).
pub const MAX_TOPIC_SIZE: usize = 256;
/// Рекомендуемая ёмкость буфера под содержимое сообщения (включая
/// терминатор).
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Текст, ограниченный ёмкостью буфера с учётом терминатора.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedText<'a> {
    text: &'a str,
    truncated: bool,
}

impl<'a> BoundedText<'a> {
    pub fn new(
        src: &'a str,
        capacity: usize,
    ) -> Self {
        let max = capacity.saturating_sub(1);
        if src.len() <= max {
            return Self {
                text: src,
                // при нулевой ёмкости не помещается даже терминатор
                truncated: capacity == 0,
            };
        }

        let mut end = max;
        while !src.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            text: &src[..end],
            truncated: true,
        }
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Был ли исходный текст обрезан.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Итог записи в буфер.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marshalled {
    /// Записано байт без учёта терминатора.
    pub written: usize,
    pub truncated: bool,
}

/// Копирует `src` в `buf` с NUL-терминатором.
///
/// Пустой буфер не трогается, результат помечается как обрезанный.
pub fn marshal_into(
    src: &str,
    buf: &mut [u8],
) -> Marshalled {
    let text = BoundedText::new(src, buf.len());
    if buf.is_empty() {
        return Marshalled {
            written: 0,
            truncated: true,
        };
    }

    let bytes = text.as_str().as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    buf[bytes.len()] = 0;

    Marshalled {
        written: bytes.len(),
        truncated: text.truncated(),
    }
}

/// Запись в сырой буфер из C. Нулевой указатель или нулевая ёмкость:
/// буфер пропускается, возвращается `None`.
///
/// # Safety
///
/// Если `ptr` не нулевой, он должен указывать на `size` байт, доступных
/// для записи, и не пересекаться с `src`.
pub unsafe fn marshal_to_raw(
    src: &str,
    ptr: *mut c_char,
    size: usize,
) -> Option<Marshalled> {
    if ptr.is_null() || size == 0 {
        return None;
    }
    let buf = unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>(), size) };
    Some(marshal_into(src, buf))
}
