//! Подсистема Publish–Subscribe (pub/sub).
//!
//! Внутрипроцессный потокобезопасный движок с двумя режимами доставки:
//!
//! - callback: обработчик вызывается синхронно на потоке публикующего;
//! - pull: сообщения копятся в FIFO-очереди (подписчик, тема) до
//!   `get_next_message`.
//!
//! Состав:
//! - `callback`: `MessageHandler`, `CallbackHandle` и слоты callback-подписок.
//! - `dispatcher`: рассылка опубликованного сообщения по снимку подписчиков.
//! - `engine`: `PubSubEngine`, владелец реестра, очередей и статистики.
//! - `message`: структура опубликованного сообщения.
//! - `queue`: хранилище pull-очередей.
//! - `registry`: реестр подписок.
//! - `stats`: счётчики движка.

pub mod callback;
pub mod dispatcher;
pub mod engine;
pub mod message;
pub mod queue;
pub mod registry;
pub mod stats;

pub use callback::{CallbackHandle, MessageHandler};
pub use dispatcher::{Dispatcher, PublishReport};
pub use engine::PubSubEngine;
pub use message::Message;
pub use queue::{PushOutcome, QueueStore};
pub use registry::{DeliveryMode, Subscription, SubscriptionRegistry};
pub use stats::{EngineStats, StatsSnapshot};

/// Пустая тема в операциях отписки и очередей означает «любая тема».
pub(crate) fn wildcard(topic: Option<&str>) -> Option<&str> {
    topic.filter(|t| !t.is_empty())
}
