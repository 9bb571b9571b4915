/// Engine configuration loading (`PUBSUB_*` environment, optional file).
pub mod config;
/// C ABI: the five legacy exports, handle-based engines, buffer marshalling.
pub mod ffi;
/// Flexible logging (formatting, filters).
pub mod logging;
/// Pub/Sub: engine, registry, queues, dispatcher.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use config::EngineConfig;
/// Boundary buffer contract.
pub use ffi::marshal::{marshal_into, BoundedText, Marshalled, MAX_MESSAGE_SIZE, MAX_TOPIC_SIZE};
/// Logging setup for host processes.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Operation errors and result types.
pub use pubsub_error::{BoundaryError, PubSubError, PubSubResult, StackError, StatusCode};
/// Pub/Sub API.
pub use pubsub::{
    CallbackHandle, DeliveryMode, Message, MessageHandler, PubSubEngine, PublishReport,
    StatsSnapshot, Subscription,
};
