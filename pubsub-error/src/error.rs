use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Отказ операции движка. Состояние движка при этом не меняется.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubSubError {
    #[error("subscriber id must not be empty")]
    EmptySubscriber,

    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("message of {size} bytes exceeds max_message_size {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("max_subscriptions ({limit}) reached")]
    SubscriptionLimit { limit: usize },
}

impl ErrorExt for PubSubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptySubscriber => StatusCode::InvalidSubscriber,
            Self::EmptyTopic => StatusCode::InvalidTopic,
            Self::MessageTooLarge { .. } => StatusCode::MessageTooLarge,
            Self::SubscriptionLimit { .. } => StatusCode::SubscriptionLimit,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Аргумент, отвергнутый на C-границе до того, как дошёл до движка.
///
/// `what` это имя параметра экспортируемой функции.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error("{what} pointer is null")]
    NullPointer { what: &'static str },

    #[error("{what} is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 {
        what: &'static str,
        valid_up_to: usize,
    },
}

impl ErrorExt for BoundaryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NullPointer { .. } => StatusCode::NullPointer,
            Self::InvalidUtf8 { .. } => StatusCode::InvalidUtf8,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
