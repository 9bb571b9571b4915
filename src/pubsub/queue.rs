use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use dashmap::DashMap;

use super::Message;

/// Сообщение в очереди с порядковым номером внутри подписчика.
#[derive(Debug, Clone)]
struct Queued {
    seq: u64,
    message: Message,
}

/// Все очереди одного подписчика: тема → FIFO.
///
/// Хранятся одной записью `DashMap`, поэтому wildcard-операции над
/// подписчиком атомарны.
#[derive(Debug, Default)]
struct SubscriberQueues {
    topics: HashMap<Arc<str>, VecDeque<Queued>>,
    /// Следующий порядковый номер; задаёт детерминированный порядок выборки
    /// по всем темам.
    next_seq: u64,
}

impl SubscriberQueues {
    fn pending(
        &self,
        topic: Option<&str>,
    ) -> usize {
        match topic {
            Some(t) => self.topics.get(t).map_or(0, VecDeque::len),
            None => self.topics.values().map(VecDeque::len).sum(),
        }
    }

    fn pop(
        &mut self,
        topic: Option<&str>,
    ) -> Option<Message> {
        let queue = match topic {
            Some(t) => self.topics.get_mut(t)?,
            None => self
                .topics
                .values_mut()
                .filter(|q| !q.is_empty())
                .min_by_key(|q| q.front().map_or(u64::MAX, |m| m.seq))?,
        };
        queue.pop_front().map(|q| q.message)
    }
}

/// Итог добавления сообщения в очередь.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Очередь была полна: самое старое сообщение вытеснено.
    EnqueuedWithEviction,
    /// Очереди для пары уже нет (подписку сняли после снимка).
    Missing,
}

/// Хранилище pull-очередей: подписчик → (тема → FIFO).
///
/// Каждая операция берёт только шард-лок `DashMap` своего подписчика.
#[derive(Debug, Default)]
pub struct QueueStore {
    queues: DashMap<Arc<str>, SubscriberQueues>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Создаёт пустую очередь для пары, если её ещё нет.
    pub fn ensure(
        &self,
        subscriber: &Arc<str>,
        topic: &Arc<str>,
    ) {
        self.queues
            .entry(subscriber.clone())
            .or_default()
            .topics
            .entry(topic.clone())
            .or_default();
    }

    /// Удаляет очередь пары. Возвращает число выброшенных сообщений.
    pub fn remove(
        &self,
        subscriber: &str,
        topic: &str,
    ) -> usize {
        let Some(mut entry) = self.queues.get_mut(subscriber) else {
            return 0;
        };
        let discarded = entry.topics.remove(topic).map_or(0, |q| q.len());
        let now_empty = entry.topics.is_empty();
        drop(entry);

        if now_empty {
            self.queues
                .remove_if(subscriber, |_, queues| queues.topics.is_empty());
        }
        discarded
    }

    /// Удаляет все очереди подписчика. Возвращает число выброшенных
    /// сообщений.
    pub fn remove_subscriber(
        &self,
        subscriber: &str,
    ) -> usize {
        self.queues
            .remove(subscriber)
            .map_or(0, |(_, queues)| queues.pending(None))
    }

    /// Добавляет сообщение в конец очереди пары.
    ///
    /// Никогда не создаёт очередь: если её нет, сообщение отбрасывается.
    /// `max_depth == 0` означает отсутствие лимита.
    pub fn push(
        &self,
        subscriber: &str,
        topic: &str,
        message: Message,
        max_depth: usize,
    ) -> PushOutcome {
        let Some(mut entry) = self.queues.get_mut(subscriber) else {
            return PushOutcome::Missing;
        };
        let queues = entry.value_mut();
        let seq = queues.next_seq;
        let Some(queue) = queues.topics.get_mut(topic) else {
            return PushOutcome::Missing;
        };

        let mut outcome = PushOutcome::Enqueued;
        if max_depth > 0 && queue.len() >= max_depth {
            queue.pop_front();
            outcome = PushOutcome::EnqueuedWithEviction;
        }
        queue.push_back(Queued { seq, message });
        queues.next_seq += 1;
        outcome
    }

    /// Есть ли сообщения для подписчика (по теме или по всем темам).
    pub fn has_messages(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> bool {
        self.pending(subscriber, topic) > 0
    }

    pub fn pending(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> usize {
        self.queues
            .get(subscriber)
            .map_or(0, |queues| queues.pending(topic))
    }

    /// Извлекает самое старое сообщение пары, либо (при `topic == None`)
    /// самое старое по всем очередям подписчика.
    pub fn pop(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> Option<Message> {
        self.queues.get_mut(subscriber)?.pop(topic)
    }

    /// Забирает все сообщения в порядке выборки `pop` под одним локом.
    pub fn drain(
        &self,
        subscriber: &str,
        topic: Option<&str>,
    ) -> Vec<Message> {
        let Some(mut queues) = self.queues.get_mut(subscriber) else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(queues.pending(topic));
        while let Some(msg) = queues.pop(topic) {
            out.push(msg);
        }
        out
    }

    /// Число подписчиков, у которых есть хотя бы одна очередь.
    pub fn subscriber_count(&self) -> usize {
        self.queues.len()
    }
}
