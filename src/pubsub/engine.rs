use std::sync::Arc;

use parking_lot::RwLock;
use pubsub_error::{ensure, PubSubError, PubSubResult, ResultExt};
use tracing::{debug, trace};

use super::{
    callback::CallbackSlot,
    dispatcher::{Dispatcher, PublishReport},
    queue::QueueStore,
    registry::{Delivery, DeliveryMode, Subscription, SubscriptionRegistry},
    stats::{EngineStats, StatsSnapshot},
    wildcard, CallbackHandle, Message, MessageHandler,
};
use crate::config::EngineConfig;

/// Внутрипроцессный pub/sub движок.
///
/// Владеет реестром подписок, pull-очередями и счётчиками. Все операции
/// синхронные и выполняются на потоке вызывающего. Экземпляров может быть
/// сколько угодно; при `Drop` всё состояние освобождается.
///
/// Порядок блокировок: реестр → хранилище очередей. Публикация не держит
/// лок реестра во время доставки.
#[derive(Debug, Default)]
pub struct PubSubEngine {
    config: EngineConfig,
    registry: RwLock<SubscriptionRegistry>,
    queues: QueueStore,
    stats: EngineStats,
}

impl PubSubEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(SubscriptionRegistry::new()),
            queues: QueueStore::new(),
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Подписывает `subscriber` на `topic`.
    ///
    /// С обработчиком: callback-режим. Без него: pull-режим, пустая очередь
    /// создаётся, если её ещё нет. Повторная подписка на ту же тему
    /// заменяет прежнюю (последняя побеждает). После возврата прежний
    /// обработчик больше не вызывается.
    pub fn subscribe(
        &self,
        subscriber: &str,
        topic: &str,
        callback: Option<CallbackHandle>,
    ) -> PubSubResult<()> {
        validate_subscriber(subscriber).context("subscribe")?;
        validate_topic(topic).context("subscribe")?;

        let delivery = match callback {
            Some(handle) => Delivery::Callback(Arc::new(CallbackSlot::new(handle))),
            None => Delivery::Queue,
        };
        let mode = delivery.mode();

        let (previous, discarded) = {
            let mut registry = self.registry.write();

            let limit = self.config.max_subscriptions;
            ensure!(
                limit == 0 || registry.contains(subscriber, topic) || registry.len() < limit,
                PubSubError::SubscriptionLimit { limit }
            );

            let inserted = registry.insert(subscriber, topic, delivery);
            let discarded = match mode {
                DeliveryMode::Queue => {
                    self.queues.ensure(&inserted.subscriber, &inserted.topic);
                    0
                }
                // очередь принадлежала заменённой pull-подписке
                DeliveryMode::Callback => self.queues.remove(subscriber, topic),
            };
            (inserted.previous, discarded)
        };

        let replaced = previous.is_some();
        if let Some(slot) = previous.and_then(Delivery::into_slot) {
            slot.retire();
        }
        self.stats.record_discarded(discarded);

        debug!(subscriber, topic, ?mode, replaced, discarded, "subscribed");
        Ok(())
    }

    /// Подписка в callback-режиме с обработчиком-замыканием.
    pub fn subscribe_fn<H>(
        &self,
        subscriber: &str,
        topic: &str,
        handler: H,
    ) -> PubSubResult<()>
    where
        H: MessageHandler + 'static,
    {
        self.subscribe(subscriber, topic, Some(CallbackHandle::new(handler)))
    }

    /// Снимает подписку пары, либо (при `None` или `""`) все подписки и
    /// очереди подписчика. Отсутствие подписки не ошибка.
    ///
    /// Вне обработчика ждёт завершения уже идущих вызовов снятых
    /// обработчиков, так что после возврата их контекст можно освобождать.
    /// Изнутри любого обработчика не ждёт: снятый обработчик может ещё
    /// выполняться на другом потоке.
    pub fn unsubscribe(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> PubSubResult<()> {
        validate_subscriber(subscriber).context("unsubscribe")?;

        let (removed, discarded) = {
            let mut registry = self.registry.write();
            match wildcard(topic) {
                None => (
                    registry.remove_subscriber(subscriber),
                    self.queues.remove_subscriber(subscriber),
                ),
                Some(topic) => (
                    registry.remove(subscriber, topic).into_iter().collect(),
                    self.queues.remove(subscriber, topic),
                ),
            }
        };

        let count = removed.len();
        for slot in removed.into_iter().filter_map(Delivery::into_slot) {
            slot.retire();
        }
        self.stats.record_discarded(discarded);

        debug!(subscriber, topic = wildcard(topic).unwrap_or("*"), removed = count, discarded, "unsubscribed");
        Ok(())
    }

    /// Публикует сообщение всем текущим подписчикам темы.
    ///
    /// Возвращается только после того, как отработали все обработчики.
    /// Публикация без подписчиков успешна и ничего не делает.
    pub fn publish(
        &self,
        topic: &str,
        content: &str,
    ) -> PubSubResult<PublishReport> {
        validate_topic(topic).context("publish")?;
        let max = self.config.max_message_size;
        ensure!(
            max == 0 || content.len() <= max,
            PubSubError::MessageTooLarge {
                size: content.len(),
                limit: max,
            }
        );

        let report = Dispatcher::new(&self.registry, &self.queues, self.config.max_queue_depth)
            .dispatch(topic, content);

        self.stats.record_publish();
        self.stats.record_report(&report);
        trace!(topic, recipients = report.recipients(), "published");
        Ok(report)
    }

    /// Есть ли сообщения в очереди пары, либо (при `None` или `""`) в любой
    /// очереди подписчика.
    pub fn has_messages(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> bool {
        !subscriber.is_empty() && self.queues.has_messages(subscriber, wildcard(topic))
    }

    /// Извлекает самое старое сообщение. Под wildcard выбирается сообщение,
    /// поставленное в очередь раньше всех по всем темам подписчика.
    pub fn get_next_message(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> Option<Message> {
        if subscriber.is_empty() {
            return None;
        }
        let msg = self.queues.pop(subscriber, wildcard(topic))?;
        self.stats.record_retrieved(1);
        Some(msg)
    }

    pub fn pending(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> usize {
        self.queues.pending(subscriber, wildcard(topic))
    }

    /// Забирает все ожидающие сообщения в порядке `get_next_message`.
    pub fn drain(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> Vec<Message> {
        let out = self.queues.drain(subscriber, wildcard(topic));
        self.stats.record_retrieved(out.len());
        out
    }

    pub fn subscribers_of(
        &self,
        topic: &str,
    ) -> Vec<Subscription> {
        self.registry.read().subscribers_of(topic)
    }

    pub fn topics_of(
        &self,
        subscriber: &str,
    ) -> Vec<Arc<str>> {
        self.registry.read().topics_of(subscriber)
    }

    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.registry.read().subscriber_count(topic)
    }

    pub fn active_topics(&self) -> Vec<Arc<str>> {
        self.registry.read().active_topics()
    }

    pub fn is_subscribed(
        &self,
        subscriber: &str,
        topic: &str,
    ) -> bool {
        self.registry.read().contains(subscriber, topic)
    }

    /// Режим доставки пары, если подписка существует.
    pub fn mode_of(
        &self,
        subscriber: &str,
        topic: &str,
    ) -> Option<DeliveryMode> {
        self.registry.read().mode_of(subscriber, topic)
    }

    /// Общее число подписок (пар подписчик/тема).
    pub fn subscription_count(&self) -> usize {
        self.registry.read().len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

fn validate_subscriber(subscriber: &str) -> PubSubResult<()> {
    ensure!(!subscriber.is_empty(), PubSubError::EmptySubscriber);
    Ok(())
}

fn validate_topic(topic: &str) -> PubSubResult<()> {
    ensure!(!topic.is_empty(), PubSubError::EmptyTopic);
    Ok(())
}
