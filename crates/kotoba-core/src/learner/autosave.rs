//! Periodic save and decay of all learners of a registry.
//!
//! `AutosaveSchedule` decides what is due at a given time and is driven by
//! the registry's clock; `AutosaveTimer` runs it on a background thread that
//! is stopped explicitly or on drop.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use super::LearnerRegistry;
use crate::clock::SECS_PER_DAY;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub saved: usize,
    pub failed: usize,
    pub decayed: bool,
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct AutosaveSchedule {
    interval_secs: u64,
    decay_every_secs: u64,
    last_save: u64,
    last_decay: u64,
}

impl AutosaveSchedule {
    /// Saves every `interval_secs`, decays once a day. Both clocks start at
    /// `now`.
    pub fn new(interval_secs: u64, now: u64) -> Self {
        Self {
            interval_secs: interval_secs.max(1),
            decay_every_secs: SECS_PER_DAY,
            last_save: now,
            last_decay: now,
        }
    }

    pub fn with_decay_every(mut self, secs: u64) -> Self {
        self.decay_every_secs = secs.max(1);
        self
    }

    /// Run whatever is due at `now`. Decay runs before the save so the
    /// decayed state is what gets persisted.
    pub fn tick(&mut self, registry: &LearnerRegistry, now: u64) -> TickReport {
        let mut report = TickReport::default();
        if now.saturating_sub(self.last_decay) >= self.decay_every_secs {
            report.removed = registry.decay_all();
            report.decayed = true;
            self.last_decay = now;
        }
        if report.decayed || now.saturating_sub(self.last_save) >= self.interval_secs {
            let (saved, failed) = registry.save_all();
            report.saved = saved;
            report.failed = failed;
            self.last_save = now;
        }
        report
    }
}

/// Background autosave thread.
pub struct AutosaveTimer {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutosaveTimer {
    /// Start ticking `schedule` every `poll` of wall time; the schedule itself
    /// reads time from the registry's clock.
    pub fn start(
        registry: Arc<LearnerRegistry>,
        mut schedule: AutosaveSchedule,
        poll: Duration,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("kotoba-autosave".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(poll) {
                    Err(RecvTimeoutError::Timeout) => {
                        let now = registry.collaborators().clock.now();
                        let report = schedule.tick(&registry, now);
                        if report.saved + report.failed > 0 || report.decayed {
                            debug!(?report, "autosave tick");
                        }
                    }
                    // explicit stop or the timer was dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        let (saved, failed) = registry.save_all();
                        info!(saved, failed, "autosave stopped");
                        break;
                    }
                }
            })?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread after a final save and wait for it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AutosaveTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
