use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use super::{callback::CallbackSlot, CallbackHandle};

/// Способ доставки для пары (подписчик, тема).
#[derive(Debug, Clone)]
pub(crate) enum Delivery {
    Callback(Arc<CallbackSlot>),
    Queue,
}

impl Delivery {
    pub(crate) fn mode(&self) -> DeliveryMode {
        match self {
            Self::Callback(_) => DeliveryMode::Callback,
            Self::Queue => DeliveryMode::Queue,
        }
    }

    /// Хендл callback-подписки, если она в callback-режиме.
    pub(crate) fn into_slot(self) -> Option<Arc<CallbackSlot>> {
        match self {
            Self::Callback(slot) => Some(slot),
            Self::Queue => None,
        }
    }
}

/// Режим доставки, видимый снаружи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Синхронный вызов обработчика при публикации.
    Callback,
    /// Накопление в FIFO-очереди до `get_next_message`.
    Queue,
}

/// Снимок подписки, выдаваемый `subscribers_of`.
///
/// Владеет своими данными, поэтому остаётся валидным после любых
/// последующих изменений реестра.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub subscriber: Arc<str>,
    pub topic: Arc<str>,
    pub(crate) delivery: Delivery,
}

impl Subscription {
    pub fn mode(&self) -> DeliveryMode {
        self.delivery.mode()
    }

    /// Хендл обработчика для callback-подписки.
    pub fn callback(&self) -> Option<&CallbackHandle> {
        match &self.delivery {
            Delivery::Callback(slot) => Some(slot.handle()),
            Delivery::Queue => None,
        }
    }
}

/// Результат вставки подписки.
#[derive(Debug)]
pub(crate) struct Inserted {
    pub(crate) subscriber: Arc<str>,
    pub(crate) topic: Arc<str>,
    /// Заменённая доставка для той же пары, если была.
    pub(crate) previous: Option<Delivery>,
}

/// Реестр подписок: тема → подписчики и обратный индекс подписчик → темы.
///
/// Сам по себе не синхронизирован; движок держит его под одним `RwLock`,
/// чтобы оба индекса менялись атомарно.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Тема → (подписчик → доставка). `BTreeMap` даёт стабильный порядок
    /// снимка.
    by_topic: HashMap<Arc<str>, BTreeMap<Arc<str>, Delivery>>,
    /// Подписчик → его темы.
    by_subscriber: HashMap<Arc<str>, BTreeSet<Arc<str>>>,
    /// Общее число пар (подписчик, тема).
    pairs: usize,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует или заменяет подписку для пары.
    ///
    /// Строки ключей переиспользуются: повторная подписка на уже известную
    /// тему не выделяет новый `Arc<str>`.
    pub(crate) fn insert(
        &mut self,
        subscriber: &str,
        topic: &str,
        delivery: Delivery,
    ) -> Inserted {
        let subscriber = self.intern_subscriber(subscriber);
        let topic = self.intern_topic(topic);

        let previous = self
            .by_topic
            .entry(topic.clone())
            .or_default()
            .insert(subscriber.clone(), delivery);

        if previous.is_none() {
            self.pairs += 1;
            self.by_subscriber
                .entry(subscriber.clone())
                .or_default()
                .insert(topic.clone());
        }

        Inserted {
            subscriber,
            topic,
            previous,
        }
    }

    /// Удаляет подписку для пары. Отсутствие подписки не ошибка.
    pub(crate) fn remove(
        &mut self,
        subscriber: &str,
        topic: &str,
    ) -> Option<Delivery> {
        let subscribers = self.by_topic.get_mut(topic)?;
        let removed = subscribers.remove(subscriber)?;
        if subscribers.is_empty() {
            self.by_topic.remove(topic);
        }

        if let Some(topics) = self.by_subscriber.get_mut(subscriber) {
            topics.remove(topic);
            if topics.is_empty() {
                self.by_subscriber.remove(subscriber);
            }
        }

        self.pairs -= 1;
        Some(removed)
    }

    /// Удаляет все подписки подписчика и возвращает снятые доставки.
    pub(crate) fn remove_subscriber(
        &mut self,
        subscriber: &str,
    ) -> Vec<Delivery> {
        let Some(topics) = self.by_subscriber.remove(subscriber) else {
            return Vec::new();
        };

        let mut removed = Vec::with_capacity(topics.len());
        for topic in topics {
            if let Some(subscribers) = self.by_topic.get_mut(&topic) {
                if let Some(delivery) = subscribers.remove(subscriber) {
                    removed.push(delivery);
                }
                if subscribers.is_empty() {
                    self.by_topic.remove(&topic);
                }
            }
        }

        self.pairs -= removed.len();
        removed
    }

    /// Снимок подписчиков темы на момент вызова (упорядочен по id).
    pub fn subscribers_of(
        &self,
        topic: &str,
    ) -> Vec<Subscription> {
        let Some((topic_key, subscribers)) = self.by_topic.get_key_value(topic) else {
            return Vec::new();
        };

        subscribers
            .iter()
            .map(|(subscriber, delivery)| Subscription {
                subscriber: subscriber.clone(),
                topic: topic_key.clone(),
                delivery: delivery.clone(),
            })
            .collect()
    }

    pub fn contains(
        &self,
        subscriber: &str,
        topic: &str,
    ) -> bool {
        self.by_topic
            .get(topic)
            .is_some_and(|subs| subs.contains_key(subscriber))
    }

    /// Режим доставки пары, если подписка существует.
    pub fn mode_of(
        &self,
        subscriber: &str,
        topic: &str,
    ) -> Option<DeliveryMode> {
        self.by_topic
            .get(topic)
            .and_then(|subs| subs.get(subscriber))
            .map(Delivery::mode)
    }

    /// Темы подписчика в лексикографическом порядке.
    pub fn topics_of(
        &self,
        subscriber: &str,
    ) -> Vec<Arc<str>> {
        self.by_subscriber
            .get(subscriber)
            .map(|topics| topics.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.by_topic.get(topic).map_or(0, BTreeMap::len)
    }

    /// Темы, на которые есть хотя бы одна подписка.
    pub fn active_topics(&self) -> Vec<Arc<str>> {
        let mut topics: Vec<_> = self.by_topic.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Общее число пар (подписчик, тема).
    pub fn len(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    fn intern_topic(
        &self,
        topic: &str,
    ) -> Arc<str> {
        self.by_topic
            .get_key_value(topic)
            .map(|(k, _)| k.clone())
            .unwrap_or_else(|| Arc::from(topic))
    }

    fn intern_subscriber(
        &self,
        subscriber: &str,
    ) -> Arc<str> {
        self.by_subscriber
            .get_key_value(subscriber)
            .map(|(k, _)| k.clone())
            .unwrap_or_else(|| Arc::from(subscriber))
    }
}
