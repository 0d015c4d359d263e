//! Per-owner (listener, wallet manager) FIFO event loop with a periodic
//! timeout dispatcher (spec §4.1). Each owner gets exactly one dispatch
//! thread; ordering within one loop is FIFO; there is no cross-loop
//! ordering guarantee (spec §5). Modeled on `chainhook-sdk::observer`'s
//! command-loop-over-channel, generalized from `std::sync::mpsc` to
//! `crossbeam-channel` so the periodic tick can be expressed as a `select!`
//! alternative to the blocking receive.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::utils::Context;

pub const CWM_CONFIRMATION_PERIOD_FACTOR: u64 = 4;
pub const CWM_MIN_SAMPLING_MS: u64 = 10_000;
pub const CWM_MAX_SAMPLING_MS: u64 = 60_000;

/// Sampling period for the periodic-timeout dispatcher: `confirmation_period
/// / CWM_CONFIRMATION_PERIOD_FACTOR`, clamped to `[10s, 60s]` (spec §4.1,
/// §6 configuration knobs).
pub fn sampling_period(confirmation_period_seconds: u64) -> Duration {
    let raw_ms = (confirmation_period_seconds * 1000) / CWM_CONFIRMATION_PERIOD_FACTOR;
    let clamped_ms = raw_ms.clamp(CWM_MIN_SAMPLING_MS, CWM_MAX_SAMPLING_MS);
    Duration::from_millis(clamped_ms)
}

enum Command<E> {
    Event(E),
    Terminate,
}

/// A single-threaded event loop owned by exactly one listener or manager.
/// Stopping it drains and destroys pending events (by simply dropping
/// them -- `E: Drop` implementers run their teardown there) without
/// cancelling any in-flight remote request (spec §4.1 "Cancellation
/// semantics").
pub struct EventLoop<E: Send + 'static> {
    sender: crossbeam_channel::Sender<Command<E>>,
    thread: Option<JoinHandle<()>>,
}

impl<E: Send + 'static> EventLoop<E> {
    /// Spawns the dispatch thread. `dispatch` handles a popped event;
    /// `on_tick` runs whenever `tick_period` elapses with no event pending.
    pub fn start<D, T>(ctx: Context, tick_period: Duration, mut dispatch: D, mut on_tick: T) -> Self
    where
        D: FnMut(E) + Send + 'static,
        T: FnMut() + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::unbounded::<Command<E>>();
        let thread = thread::spawn(move || loop {
            crossbeam_channel::select! {
                recv(receiver) -> msg => match msg {
                    Ok(Command::Event(event)) => dispatch(event),
                    Ok(Command::Terminate) | Err(_) => break,
                },
                default(tick_period) => on_tick(),
            }
            let _ = &ctx;
        });
        EventLoop {
            sender,
            thread: Some(thread),
        }
    }

    pub fn enqueue(&self, event: E) {
        let _ = self.sender.send(Command::Event(event));
    }

    /// Drains and destroys pending events, then joins the dispatch thread.
    pub fn stop(&mut self) {
        let _ = self.sender.send(Command::Terminate);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl<E: Send + 'static> Drop for EventLoop<E> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}

/// The required weak-take-from-event pattern (spec §4.1): an event that
/// closes over an entity stores only a [`Weak`] handle; on dispatch the
/// loop attempts a strong upgrade, and if the entity was already released
/// the event is silently dropped instead of calling back into it.
pub fn dispatch_weak<T, F>(weak: &Weak<T>, f: F)
where
    F: FnOnce(Arc<T>),
{
    if let Some(strong) = weak.upgrade() {
        f(strong);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sampling_period_clamps_to_bounds() {
        assert_eq!(sampling_period(1), Duration::from_millis(CWM_MIN_SAMPLING_MS));
        assert_eq!(
            sampling_period(10_000_000),
            Duration::from_millis(CWM_MAX_SAMPLING_MS)
        );
    }

    #[test]
    fn sampling_period_uses_quarter_of_confirmation_period() {
        // 160s / 4 = 40s, within [10s, 60s].
        assert_eq!(sampling_period(160), Duration::from_millis(40_000));
    }

    #[test]
    fn dispatch_weak_skips_released_entity() {
        let count = Arc::new(AtomicUsize::new(0));
        let weak = {
            let strong = Arc::new(5i32);
            Arc::downgrade(&strong)
            // `strong` drops here; only the weak handle survives.
        };
        dispatch_weak(&weak, |_v| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn event_loop_dispatches_fifo() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut loop_handle = EventLoop::start(
            Context::empty(),
            Duration::from_millis(50),
            move |event: i32| {
                seen_clone.lock().unwrap().push(event);
            },
            || {},
        );
        for i in 0..5 {
            loop_handle.enqueue(i);
        }
        loop_handle.stop();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
