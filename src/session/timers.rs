//! Named, independently cancellable timer slots
//!
//! Each slot holds at most one task. Arming a slot aborts whatever was there
//! before, so timers never stack up. All timing goes through `tokio::time`,
//! which makes the slots drivable from a paused test clock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Timer classes owned by the session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// One-shot retry after a failed connect; cancelled on success or disconnect
    Reconnect,
    /// Periodic forced status check while connected
    StatusPoll,
    /// Periodic latency probe while connected
    HealthPoll,
    /// Periodic streaming credential renewal while connected
    TokenRenewal,
}

impl TimerSlot {
    pub const ALL: [TimerSlot; 4] = [
        TimerSlot::Reconnect,
        TimerSlot::StatusPoll,
        TimerSlot::HealthPoll,
        TimerSlot::TokenRenewal,
    ];
}

impl fmt::Display for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerSlot::Reconnect => "reconnect",
            TimerSlot::StatusPoll => "status_poll",
            TimerSlot::HealthPoll => "health_poll",
            TimerSlot::TokenRenewal => "token_renewal",
        };
        f.write_str(name)
    }
}

struct Armed {
    id: u64,
    handle: JoinHandle<()>,
}

type SlotMap = Arc<Mutex<HashMap<TimerSlot, Armed>>>;

/// Scheduler with one entry per [`TimerSlot`]
pub struct TimerSlots {
    slots: SlotMap,
    next_id: AtomicU64,
}

impl TimerSlots {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run `task` once after `delay`
    ///
    /// The slot is released right before `task` starts, so the task may re-arm
    /// its own slot without aborting itself.
    pub fn arm_once<F>(&self, slot: TimerSlot, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slots = self.slots.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = slots.lock();
                if map.get(&slot).map(|armed| armed.id) == Some(id) {
                    map.remove(&slot);
                }
            }
            trace!("Timer {} fired", slot);
            task.await;
        });

        self.install(slot, id, handle);
    }

    /// Run `tick` every `period`, first run one period from now
    ///
    /// Each tick is spawned detached: cancelling the slot stops future ticks
    /// but lets an in-flight tick finish.
    pub fn arm_interval<F, Fut>(&self, slot: TimerSlot, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // tokio rejects a zero period
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                trace!("Timer {} ticked", slot);
                tokio::spawn(tick());
            }
        });

        self.install(slot, id, handle);
    }

    fn install(&self, slot: TimerSlot, id: u64, handle: JoinHandle<()>) {
        let previous = self.slots.lock().insert(slot, Armed { id, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    /// Cancel one slot; returns whether something was armed
    pub fn cancel(&self, slot: TimerSlot) -> bool {
        match self.slots.lock().remove(&slot) {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<Armed> = self.slots.lock().drain().map(|(_, armed)| armed).collect();
        for armed in drained {
            armed.handle.abort();
        }
    }

    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        self.slots
            .lock()
            .get(&slot)
            .map(|armed| !armed.handle.is_finished())
            .unwrap_or(false)
    }

    /// Number of armed slots
    pub fn armed_count(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|armed| !armed.handle.is_finished())
            .count()
    }
}

impl Default for TimerSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerSlots {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
