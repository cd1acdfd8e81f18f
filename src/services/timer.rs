//! Page timers — countdowns that advance the show on their own.
//!
//! DESIGN
//! ======
//! Each timer is a tokio task that sleeps and then enqueues
//! [`Command::TimerFired`] into the engine's command channel. It never touches
//! presentation state itself.
//!
//! The registry entry is the single source of truth. Cancelling removes the
//! entry and aborts the task; a fire that was already queued before the
//! cancel carries a generation number that no longer matches, so the engine
//! drops it in [`TimerManager::claim`].
//!
//! The manager only holds a weak sender, so pending timers never keep the
//! engine alive after every connection handle is gone.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::services::engine::Command;

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct TimerManager {
    /// Active timers (page id -> entry).
    timers: HashMap<String, TimerEntry>,
    next_generation: u64,
    command_tx: mpsc::WeakSender<Command>,
}

impl TimerManager {
    #[must_use]
    pub fn new(command_tx: mpsc::WeakSender<Command>) -> Self {
        Self { timers: HashMap::new(), next_generation: 0, command_tx }
    }

    /// Start a countdown for `page_id`, replacing any existing one.
    ///
    /// A zero duration starts nothing. Returns the new timer's generation.
    pub fn start(&mut self, page_id: &str, duration: Duration) -> Option<u64> {
        self.cancel(page_id);
        if duration.is_zero() {
            return None;
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let command_tx = self.command_tx.clone();
        let fired_page = page_id.to_owned();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            trace!(page_id = %fired_page, generation, "timer elapsed");
            let Some(tx) = command_tx.upgrade() else {
                return;
            };
            let _ = tx.send(Command::TimerFired { page_id: fired_page, generation }).await;
        });

        self.timers.insert(page_id.to_owned(), TimerEntry { generation, handle });
        debug!(page_id, generation, ?duration, "timer started");
        Some(generation)
    }

    /// Cancel the timer for `page_id`. No-op if there is none.
    pub fn cancel(&mut self, page_id: &str) -> bool {
        let Some(entry) = self.timers.remove(page_id) else {
            return false;
        };
        entry.handle.abort();
        debug!(page_id, generation = entry.generation, "timer cancelled");
        true
    }

    /// Accept a fire for `page_id`. Succeeds only if that exact timer is
    /// still registered, and unregisters it.
    pub fn claim(&mut self, page_id: &str, generation: u64) -> bool {
        match self.timers.get(page_id) {
            Some(entry) if entry.generation == generation => {
                self.timers.remove(page_id);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_active(&self, page_id: &str) -> bool {
        self.timers.contains_key(page_id)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    pub fn cancel_all(&mut self) {
        for (page_id, entry) in self.timers.drain() {
            entry.handle.abort();
            trace!(%page_id, "timer cancelled (cancel_all)");
        }
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
#[path = "timer_test.rs"]
mod tests;
