// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative timer event loop.
//!
//! One background thread fires every discovery timer: the participant
//! resend, the per-remote lease watchdogs, EDP retransmissions. Commands
//! (schedule/restart/cancel) travel over a channel and are processed on
//! the loop thread between callback invocations, which makes cancellation
//! racy-safe: a callback either runs to completion or not at all, never
//! partially. A panicking callback is caught, logged, and its timer
//! dropped; nothing escapes the loop.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

/// What a timer callback wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Fire again after the current interval.
    Repeat,
    /// Remove the timer.
    Stop,
}

/// Periodic timer callback. Runs on the event-loop thread.
pub type TimerCallback = Box<dyn FnMut() -> TimerAction + Send>;

enum Cmd {
    Schedule {
        id: u64,
        interval: Duration,
        callback: TimerCallback,
    },
    Restart {
        id: u64,
        interval: Duration,
    },
    Cancel {
        id: u64,
    },
    Shutdown,
}

/// Handle to an installed timer.
///
/// Dropping the handle does not cancel the timer; cancellation is always
/// explicit so shutdown order stays visible at the call site.
#[derive(Clone)]
pub struct TimerHandle {
    id: u64,
    tx: Sender<Cmd>,
}

impl TimerHandle {
    /// Reset the timer phase and interval.
    pub fn restart(&self, interval: Duration) {
        let _ = self.tx.send(Cmd::Restart {
            id: self.id,
            interval,
        });
    }

    /// Remove the timer. Safe against concurrent firing: the callback
    /// either already ran completely or will not run again.
    pub fn cancel(&self) {
        let _ = self.tx.send(Cmd::Cancel { id: self.id });
    }
}

struct TimerState {
    callback: TimerCallback,
    interval: Duration,
    generation: u64,
}

struct HeapEntry {
    deadline: Instant,
    id: u64,
    generation: u64,
}

/// Single-threaded cooperative timer loop.
pub struct EventLoop {
    tx: Sender<Cmd>,
    next_id: AtomicU64,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// Spawn the loop thread.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        let thread = std::thread::Builder::new()
            .name("hdds-disc-events".to_string())
            .spawn(move || run_loop(&rx))
            .expect("spawn event loop thread");
        Self {
            tx,
            next_id: AtomicU64::new(1),
            thread: Mutex::new(Some(thread)),
        }
    }

    /// Install a periodic timer firing every `interval` until the
    /// callback returns [`TimerAction::Stop`] or the handle is canceled.
    pub fn schedule(&self, interval: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(Cmd::Schedule {
            id,
            interval,
            callback,
        });
        TimerHandle {
            id,
            tx: self.tx.clone(),
        }
    }

    /// Drain pending commands, drop every timer, and join the thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Cmd::Shutdown);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(rx: &Receiver<Cmd>) {
    let mut states: HashMap<u64, TimerState> = HashMap::new();
    // Small timer population; a sorted scan beats heap bookkeeping here.
    let mut entries: Vec<HeapEntry> = Vec::new();

    loop {
        let now = Instant::now();
        let next_deadline = entries.iter().map(|e| e.deadline).min();

        let cmd = match next_deadline {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(now);
                match rx.recv_timeout(timeout) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match rx.recv() {
                Ok(cmd) => Some(cmd),
                Err(_) => return,
            },
        };

        match cmd {
            Some(Cmd::Schedule {
                id,
                interval,
                callback,
            }) => {
                // A zero interval would spin the fire loop.
                let interval = interval.max(Duration::from_millis(1));
                states.insert(
                    id,
                    TimerState {
                        callback,
                        interval,
                        generation: 0,
                    },
                );
                entries.push(HeapEntry {
                    deadline: Instant::now() + interval,
                    id,
                    generation: 0,
                });
            }
            Some(Cmd::Restart { id, interval }) => {
                let interval = interval.max(Duration::from_millis(1));
                if let Some(state) = states.get_mut(&id) {
                    state.generation += 1;
                    state.interval = interval;
                    entries.push(HeapEntry {
                        deadline: Instant::now() + interval,
                        id,
                        generation: state.generation,
                    });
                }
            }
            Some(Cmd::Cancel { id }) => {
                states.remove(&id);
            }
            Some(Cmd::Shutdown) => return,
            None => {}
        }

        // Fire everything due. Stale entries (canceled or restarted) are
        // skipped by the generation check. swap_remove moves a fresh
        // element into `idx`, so the index only advances past not-due
        // entries.
        let now = Instant::now();
        let mut idx = 0;
        while idx < entries.len() {
            if entries[idx].deadline > now {
                idx += 1;
                continue;
            }
            let entry = entries.swap_remove(idx);
            let Some(state) = states.get_mut(&entry.id) else {
                continue;
            };
            if state.generation != entry.generation {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| (state.callback)()));
            match outcome {
                Ok(TimerAction::Repeat) => {
                    entries.push(HeapEntry {
                        deadline: now + state.interval,
                        id: entry.id,
                        generation: entry.generation,
                    });
                }
                Ok(TimerAction::Stop) => {
                    states.remove(&entry.id);
                }
                Err(_) => {
                    log::error!("[events] Timer {} callback panicked, removed", entry.id);
                    states.remove(&entry.id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counted_timer(
        events: &EventLoop,
        interval: Duration,
        stop_after: usize,
    ) -> (Arc<AtomicUsize>, TimerHandle) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = Arc::clone(&count);
        let handle = events.schedule(
            interval,
            Box::new(move || {
                let fired = count_cb.fetch_add(1, Ordering::SeqCst) + 1;
                if fired >= stop_after {
                    TimerAction::Stop
                } else {
                    TimerAction::Repeat
                }
            }),
        );
        (count, handle)
    }

    #[test]
    fn test_timer_fires_and_repeats() {
        let events = EventLoop::new();
        let (count, _handle) = counted_timer(&events, Duration::from_millis(10), 3);
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        events.shutdown();
    }

    #[test]
    fn test_cancel_stops_firing() {
        let events = EventLoop::new();
        let (count, handle) = counted_timer(&events, Duration::from_millis(20), usize::MAX);
        std::thread::sleep(Duration::from_millis(50));
        handle.cancel();
        std::thread::sleep(Duration::from_millis(30));
        let frozen = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), frozen);
        events.shutdown();
    }

    #[test]
    fn test_restart_resets_phase() {
        let events = EventLoop::new();
        let (count, handle) = counted_timer(&events, Duration::from_millis(500), usize::MAX);
        // Long timer not yet due; restart with a short interval.
        handle.restart(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(100));
        assert!(count.load(Ordering::SeqCst) >= 1);
        handle.cancel();
        events.shutdown();
    }

    #[test]
    fn test_panic_is_contained() {
        let events = EventLoop::new();
        let _panicker = events.schedule(
            Duration::from_millis(10),
            Box::new(|| panic!("timer panic")),
        );
        let (count, _handle) = counted_timer(&events, Duration::from_millis(10), 2);
        std::thread::sleep(Duration::from_millis(120));
        // The panicking timer was dropped; the healthy one kept firing.
        assert_eq!(count.load(Ordering::SeqCst), 2);
        events.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let events = EventLoop::new();
        events.shutdown();
        events.shutdown();
    }
}
