use parking_lot::RwLock;
use tracing::{trace, warn};

use super::{
    callback::Invocation,
    queue::{PushOutcome, QueueStore},
    registry::{Delivery, SubscriptionRegistry},
    Message,
};

/// Что произошло при одной публикации.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Обработчики, вызванные без паники.
    pub callbacks_invoked: usize,
    pub callback_panics: usize,
    pub messages_enqueued: usize,
    /// Сообщения, вытесненные из переполненных очередей этой публикацией.
    pub messages_evicted: usize,
}

impl PublishReport {
    /// Сколько подписчиков получили сообщение.
    pub fn recipients(&self) -> usize {
        self.callbacks_invoked + self.messages_enqueued
    }
}

/// Рассылка опубликованного сообщения по подписчикам темы.
///
/// Снимок подписчиков берётся под read-локом реестра; доставка идёт уже
/// без него. Обработчик может вызвать `subscribe`/`unsubscribe`/`publish`
/// на том же движке без взаимоблокировки.
pub struct Dispatcher<'a> {
    registry: &'a RwLock<SubscriptionRegistry>,
    queues: &'a QueueStore,
    max_queue_depth: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        registry: &'a RwLock<SubscriptionRegistry>,
        queues: &'a QueueStore,
        max_queue_depth: usize,
    ) -> Self {
        Self {
            registry,
            queues,
            max_queue_depth,
        }
    }

    pub fn dispatch(
        &self,
        topic: &str,
        content: &str,
    ) -> PublishReport {
        let snapshot = self.registry.read().subscribers_of(topic);
        let mut report = PublishReport::default();
        let Some(first) = snapshot.first() else {
            return report;
        };

        // тема берётся из реестра, чтобы не выделять её заново
        let message = Message::new(first.topic.clone(), content);

        for sub in &snapshot {
            match &sub.delivery {
                Delivery::Callback(slot) => match slot.invoke(&message) {
                    Invocation::Delivered => {
                        trace!(subscriber = %sub.subscriber, topic, "callback invoked");
                        report.callbacks_invoked += 1;
                    }
                    Invocation::Panicked => {
                        warn!(subscriber = %sub.subscriber, topic, "callback panicked during delivery");
                        report.callback_panics += 1;
                    }
                    Invocation::Retired => {
                        trace!(subscriber = %sub.subscriber, topic, "callback retired after snapshot");
                    }
                },
                Delivery::Queue => {
                    match self.queues.push(
                        &sub.subscriber,
                        topic,
                        message.clone(),
                        self.max_queue_depth,
                    ) {
                        PushOutcome::Enqueued => {
                            report.messages_enqueued += 1;
                        }
                        PushOutcome::EnqueuedWithEviction => {
                            warn!(
                                subscriber = %sub.subscriber,
                                topic,
                                max_depth = self.max_queue_depth,
                                "queue full, oldest message evicted"
                            );
                            report.messages_enqueued += 1;
                            report.messages_evicted += 1;
                        }
                        PushOutcome::Missing => {
                            trace!(subscriber = %sub.subscriber, topic, "queue removed after snapshot");
                        }
                    }
                }
            }
        }

        report
    }
}
