//! Общие заготовки для бенчмарков `pubsub-core`.

use pubsub_core::PubSubEngine;
use pubsub_error::PubSubResult;

/// Движок с `callbacks` callback-подписчиками и `queues` pull-подписчиками
/// на одной теме.
pub fn engine_with_subscribers(
    topic: &str,
    callbacks: usize,
    queues: usize,
) -> PubSubResult<PubSubEngine> {
    let engine = PubSubEngine::default();
    for i in 0..callbacks {
        engine.subscribe_fn(&format!("cb-{i}"), topic, |_: &str, _: &str| {})?;
    }
    for i in 0..queues {
        engine.subscribe(&format!("q-{i}"), topic, None)?;
    }
    Ok(engine)
}
