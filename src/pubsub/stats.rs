use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Счётчики движка. Все обновления `Relaxed`: значения используются только
/// для наблюдения, не для синхронизации.
#[derive(Debug, Default)]
pub struct EngineStats {
    publish_count: AtomicU64,
    callbacks_invoked: AtomicU64,
    callback_panics: AtomicU64,
    messages_enqueued: AtomicU64,
    messages_evicted: AtomicU64,
    messages_retrieved: AtomicU64,
    messages_discarded: AtomicU64,
}

/// Снимок счётчиков на момент вызова.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Общее количество успешных вызовов `publish`.
    pub publish_count: u64,
    pub callbacks_invoked: u64,
    /// Паники обработчиков, перехваченные при доставке.
    pub callback_panics: u64,
    pub messages_enqueued: u64,
    /// Вытеснены из переполненных очередей.
    pub messages_evicted: u64,
    /// Извлечены через `get_next_message`/`drain`.
    pub messages_retrieved: u64,
    /// Выброшены вместе с очередью при отписке или смене режима.
    pub messages_discarded: u64,
}

impl EngineStats {
    pub(crate) fn record_publish(&self) {
        self.publish_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_report(
        &self,
        report: &super::PublishReport,
    ) {
        add(&self.callbacks_invoked, report.callbacks_invoked);
        add(&self.callback_panics, report.callback_panics);
        add(&self.messages_enqueued, report.messages_enqueued);
        add(&self.messages_evicted, report.messages_evicted);
    }

    pub(crate) fn record_retrieved(
        &self,
        n: usize,
    ) {
        add(&self.messages_retrieved, n);
    }

    pub(crate) fn record_discarded(
        &self,
        n: usize,
    ) {
        add(&self.messages_discarded, n);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            publish_count: self.publish_count.load(Ordering::Relaxed),
            callbacks_invoked: self.callbacks_invoked.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            messages_evicted: self.messages_evicted.load(Ordering::Relaxed),
            messages_retrieved: self.messages_retrieved.load(Ordering::Relaxed),
            messages_discarded: self.messages_discarded.load(Ordering::Relaxed),
        }
    }
}

#[inline]
fn add(
    counter: &AtomicU64,
    n: usize,
) {
    if n > 0 {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}
