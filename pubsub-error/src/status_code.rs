use std::fmt;

use num_enum::TryFromPrimitive;

/// Код ошибки, видимый через C ABI (`pubsub_last_error_code`).
///
/// Сотни группируют источник: 1xx конфигурация и внутренние сбои, 2xx
/// аргументы операций, 3xx лимиты, 4xx сама граница вызова. `0` означает
/// отсутствие ошибки и вариантом не является.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
pub enum StatusCode {
    Internal = 100,
    InvalidConfig = 101,

    InvalidSubscriber = 200,
    InvalidTopic = 201,

    MessageTooLarge = 300,
    SubscriptionLimit = 301,

    NullPointer = 400,
    InvalidUtf8 = 401,
}

/// Уровень, на котором граница пишет ошибку в лог.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl StatusCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Ошибки аргументов пишутся тише, чем лимиты и сбои движка.
    pub fn log_level(self) -> LogLevel {
        match self {
            Self::InvalidSubscriber | Self::InvalidTopic => LogLevel::Debug,
            Self::NullPointer | Self::InvalidUtf8 | Self::MessageTooLarge => LogLevel::Info,
            Self::SubscriptionLimit | Self::InvalidConfig => LogLevel::Warn,
            Self::Internal => LogLevel::Error,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}
