// src/etw/event_log.rs

//! Event log fed by a bounded channel.
//!
//! The OS callback never takes the log's lock: it pushes decoded events into
//! a bounded crossbeam channel with `try_send` (dropping and counting when
//! full) and a dedicated drain thread appends them to the log. Readers copy a
//! snapshot out under the lock and work on it lock-free.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use super::worker::Worker;
use crate::comms::events::FileEvent;

/// Append-only, ordered store of accepted events plus diagnostic counters.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<FileEvent>>,
    total_seen: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time counters, for logging and the `stats()` API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    pub seen: u64,
    pub accepted: u64,
    pub dropped: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: FileEvent) {
        self.lock().push(event);
    }

    pub fn snapshot(&self) -> Vec<FileEvent> {
        self.lock().clone()
    }

    /// Empty the log and reset both counters.
    pub fn clear(&self) {
        self.lock().clear();
        self.total_seen.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count one delivered record, accepted or not.
    pub fn record_seen(&self) {
        self.total_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_seen(&self) -> u64 {
        self.total_seen.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> LogStats {
        LogStats {
            seen: self.total_seen(),
            accepted: self.len() as u64,
            dropped: self.dropped(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FileEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer end handed to the record callback.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<FileEvent>,
    log: Arc<EventLog>,
}

impl EventSender {
    /// Never blocks. Returns `false` if the event was dropped.
    pub fn send(&self, event: FileEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.log.record_dropped();
                false
            }
        }
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }
}

/// Create the channel and spawn the thread that drains it into `log`.
///
/// The thread exits once every [`EventSender`] clone has been dropped and the
/// channel is empty, so joining it after the pump has stopped guarantees the
/// log holds every event that was accepted.
pub fn spawn_drain(
    log: Arc<EventLog>,
    capacity: usize,
) -> std::io::Result<(EventSender, Worker)> {
    let (tx, rx) = channel::bounded::<FileEvent>(capacity.max(1));
    let sink_log = log.clone();
    let worker = Worker::spawn("etw-log-drain", move || drain(rx, &sink_log))?;
    Ok((EventSender { tx, log }, worker))
}

fn drain(rx: Receiver<FileEvent>, store: &EventLog) {
    while let Ok(event) = rx.recv() {
        store.append(event);
    }
    log::debug!("log drain finished ({} events)", store.len());
}
