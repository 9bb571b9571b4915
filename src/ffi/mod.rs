//! C ABI движка pub/sub.
//!
//! Два набора функций:
//!
//! - `legacy`: пять исходных экспортов (`subscribe`, `unsubscribe`,
//!   `publish`, `get_next_message`, `has_messages`) на процессном движке по
//!   умолчанию;
//! - `handle`: те же операции на явных экземплярах
//!   (`pubsub_engine_new` / `pubsub_engine_free`).
//!
//! ```c
//! bool subscribe(const char *subscriber_id, const char *topic,
//!                void (*cb)(const char *, const char *, void *),
//!                void *user_data);
//!
//! char topic[MAX_TOPIC_SIZE], msg[MAX_MESSAGE_SIZE];
//! subscribe("sub2", "news", NULL, NULL);
//! publish("news", "m1");
//! while (get_next_message("sub2", "news", topic, sizeof topic, msg, sizeof msg)) {
//!     printf("%s: %s\n", topic, msg);
//! }
//! ```
//!
//! Ошибки сводятся к `false`; текст последней ошибки потока доступен через
//! `pubsub_last_error`, её числовой `StatusCode` через
//! `pubsub_last_error_code`.

pub mod handle;
pub mod legacy;
pub mod marshal;
pub mod types;

pub use handle::{
    pubsub_engine_free, pubsub_engine_get_next_message, pubsub_engine_has_messages,
    pubsub_engine_new, pubsub_engine_publish, pubsub_engine_subscribe, pubsub_engine_unsubscribe,
    pubsub_last_error, pubsub_last_error_code,
};
pub use legacy::{default_engine, get_next_message, has_messages, publish, subscribe, unsubscribe};
pub use marshal::{marshal_into, BoundedText, Marshalled, MAX_MESSAGE_SIZE, MAX_TOPIC_SIZE};
pub use types::{MessageCallback, PubSubHandle};
