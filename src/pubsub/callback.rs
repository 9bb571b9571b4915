use std::{
    cell::Cell,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::{Condvar, Mutex};

use super::Message;

thread_local! {
    /// Глубина вложенности обработчиков на текущем потоке.
    static HANDLER_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Обработчик сообщений в callback-режиме.
///
/// Вызывается синхронно на потоке публикующего. Обработчик может сам
/// вызывать `subscribe`/`unsubscribe`/`publish` на том же движке.
pub trait MessageHandler: Send + Sync {
    fn on_message(
        &self,
        topic: &str,
        content: &str,
    );
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn on_message(
        &self,
        topic: &str,
        content: &str,
    ) {
        self(topic, content)
    }
}

/// Непрозрачная ссылка на контекст вызова, принадлежащий вызывающей стороне.
///
/// Движок хранит хендл по значению и вызывает его, но никогда не заглядывает
/// в пользовательские данные. Клонирование дешёвое (`Arc`).
#[derive(Clone)]
pub struct CallbackHandle {
    handler: Arc<dyn MessageHandler>,
}

impl CallbackHandle {
    pub fn new<H>(handler: H) -> Self
    where
        H: MessageHandler + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Указывают ли оба хендла на один и тот же обработчик.
    pub fn same_handler(
        &self,
        other: &CallbackHandle,
    ) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }
}

impl fmt::Debug for CallbackHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("handler", &Arc::as_ptr(&self.handler))
            .finish()
    }
}

/// Результат одной попытки доставки в callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invocation {
    Delivered,
    /// Подписка уже снята или заменена; обработчик не вызывался.
    Retired,
    /// Обработчик запаниковал; паника перехвачена.
    Panicked,
}

/// Хендл конкретной подписки в callback-режиме.
///
/// Создаётся на каждый `subscribe` с обработчиком. После `retire` новые
/// вызовы не начинаются, а сам `retire` (вызванный вне обработчика) ждёт
/// завершения уже идущих. Поэтому после возврата `unsubscribe` вызывающая
/// сторона может освобождать свои пользовательские данные.
pub(crate) struct CallbackSlot {
    handle: CallbackHandle,
    retired: AtomicBool,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl CallbackSlot {
    pub(crate) fn new(handle: CallbackHandle) -> Self {
        Self {
            handle,
            retired: AtomicBool::new(false),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    pub(crate) fn handle(&self) -> &CallbackHandle {
        &self.handle
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn invoke(
        &self,
        msg: &Message,
    ) -> Invocation {
        {
            let mut in_flight = self.in_flight.lock();
            // проверка под тем же мьютексом, что и в retire
            if self.retired.load(Ordering::Acquire) {
                return Invocation::Retired;
            }
            *in_flight += 1;
        }

        let _guard = InFlightGuard::enter(self);
        let handler = &self.handle.handler;
        match catch_unwind(AssertUnwindSafe(|| {
            handler.on_message(msg.topic(), msg.content())
        })) {
            Ok(()) => Invocation::Delivered,
            Err(_) => Invocation::Panicked,
        }
    }

    /// Запрещает новые вызовы и ждёт текущие.
    ///
    /// Если поток сам находится внутри какого-либо обработчика (любого
    /// слота), ожидание пропускается: иначе два обработчика, снимающие
    /// подписки друг друга, ждали бы друг друга вечно. В этом случае
    /// вызов этого слота на другом потоке может ещё идти после возврата.
    pub(crate) fn retire(&self) {
        let mut in_flight = self.in_flight.lock();
        self.retired.store(true, Ordering::Release);
        if HANDLER_DEPTH.with(Cell::get) > 0 {
            return;
        }
        while *in_flight > 0 {
            self.idle.wait(&mut in_flight);
        }
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("handle", &self.handle)
            .field("retired", &self.is_retired())
            .finish()
    }
}

/// Снимает счётчик in-flight и глубину вложенности даже при панике.
struct InFlightGuard<'a> {
    slot: &'a CallbackSlot,
}

impl<'a> InFlightGuard<'a> {
    fn enter(slot: &'a CallbackSlot) -> Self {
        HANDLER_DEPTH.with(|d| d.set(d.get() + 1));
        Self { slot }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        HANDLER_DEPTH.with(|d| d.set(d.get() - 1));
        let mut in_flight = self.slot.in_flight.lock();
        *in_flight -= 1;
        if *in_flight == 0 {
            self.slot.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc, Arc,
        },
        thread,
        time::Duration,
    };

    use super::*;

    fn counting_slot() -> (Arc<CallbackSlot>, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let slot = CallbackSlot::new(CallbackHandle::new(move |_: &str, _: &str| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        (Arc::new(slot), hits)
    }

    /// Тест проверяет, что замыкание получает тему и содержимое.
    #[test]
    fn test_closure_handler_receives_topic_and_content() {
        let (tx, rx) = mpsc::channel();
        let slot = CallbackSlot::new(CallbackHandle::new(move |t: &str, c: &str| {
            tx.send((t.to_string(), c.to_string())).unwrap();
        }));

        let res = slot.invoke(&Message::new("news", "m1"));
        assert_eq!(res, Invocation::Delivered);
        assert_eq!(rx.recv().unwrap(), ("news".to_string(), "m1".to_string()));
    }

    /// Тест проверяет, что после retire обработчик больше не вызывается.
    #[test]
    fn test_retired_slot_is_not_invoked() {
        let (slot, hits) = counting_slot();
        slot.invoke(&Message::new("t", "a"));
        slot.retire();

        assert_eq!(slot.invoke(&Message::new("t", "b")), Invocation::Retired);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(slot.is_retired());
    }

    /// Тест проверяет, что паника обработчика перехватывается и счётчик
    /// in-flight возвращается в ноль (retire не зависает).
    #[test]
    fn test_panicking_handler_is_contained() {
        let slot = CallbackSlot::new(CallbackHandle::new(|_: &str, _: &str| {
            panic!("handler failure");
        }));

        assert_eq!(slot.invoke(&Message::new("t", "x")), Invocation::Panicked);
        slot.retire();
        assert_eq!(*slot.in_flight.lock(), 0);
    }

    /// Тест проверяет, что retire ждёт завершения идущего вызова.
    #[test]
    fn test_retire_waits_for_in_flight_invocation() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let f = finished.clone();
        let slot = Arc::new(CallbackSlot::new(CallbackHandle::new(
            move |_: &str, _: &str| {
                entered_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                f.store(true, Ordering::SeqCst);
            },
        )));

        let worker = {
            let slot = slot.clone();
            thread::spawn(move || slot.invoke(&Message::new("t", "slow")))
        };

        entered_rx.recv().unwrap();
        slot.retire();
        assert!(
            finished.load(Ordering::SeqCst),
            "retire вернулся раньше, чем закончился обработчик"
        );
        assert_eq!(worker.join().unwrap(), Invocation::Delivered);
    }

    /// Тест проверяет, что retire изнутри обработчика не блокируется.
    #[test]
    fn test_retire_from_inside_handler_does_not_block() {
        let cell: Arc<Mutex<Option<Arc<CallbackSlot>>>> = Arc::new(Mutex::new(None));
        let c = cell.clone();
        let slot = Arc::new(CallbackSlot::new(CallbackHandle::new(
            move |_: &str, _: &str| {
                let me = c.lock().clone();
                if let Some(me) = me {
                    me.retire();
                }
            },
        )));
        *cell.lock() = Some(slot.clone());

        assert_eq!(slot.invoke(&Message::new("t", "x")), Invocation::Delivered);
        assert!(slot.is_retired());
        *cell.lock() = None;
    }

    #[test]
    fn test_same_handler() {
        let a = CallbackHandle::new(|_: &str, _: &str| {});
        let b = a.clone();
        let c = CallbackHandle::new(|_: &str, _: &str| {});
        assert!(a.same_handler(&b));
        assert!(!a.same_handler(&c));
    }
}
