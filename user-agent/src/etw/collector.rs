// src/etw/collector.rs

//! Pump thread and record callback target.
//!
//! The pump thread makes one blocking call into the backend's
//! `process_trace`. The OS invokes the registered callback synchronously, once
//! per record, until the trace handle is closed. Closing the handle is the
//! only way to end the pump from outside.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use metrics::counter;

use super::backend::TraceBackend;
use super::decoder::EventDecoder;
use super::event_log::EventSender;
use super::worker::Worker;

/// What the OS callback talks to. Lives exactly as long as the session that
/// registered it; the controller flips `active` off before it starts tearing
/// the session down.
pub struct RecordSink {
    active: AtomicBool,
    decoder: Arc<EventDecoder>,
    events: EventSender,
}

impl RecordSink {
    pub fn new(decoder: Arc<EventDecoder>, events: EventSender) -> Self {
        Self { active: AtomicBool::new(false), decoder, events }
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Callback body. Must stay fast and must never block: a slow callback
    /// lets the OS buffers fill and events get lost upstream.
    pub fn on_record(&self, event_id: u16, process_id: u32, payload: &[u8]) {
        if !self.is_active() {
            return;
        }
        self.events.log().record_seen();
        counter!("etw_records_seen_total").increment(1);

        let Some(event) = self.decoder.decode(event_id, process_id, payload) else {
            return;
        };
        if self.events.send(event) {
            counter!("etw_events_accepted_total").increment(1);
        } else {
            counter!("etw_events_dropped_total").increment(1);
        }
    }
}

/// Owns the pump thread for one open trace.
pub struct EventCollector {
    trace: u64,
    pump: Worker,
}

impl EventCollector {
    pub fn start(backend: Arc<dyn TraceBackend>, trace: u64) -> io::Result<Self> {
        let pump = Worker::spawn("etw-pump", move || run_pump(backend.as_ref(), trace))?;
        Ok(Self { trace, pump })
    }

    pub fn trace_handle(&self) -> u64 {
        self.trace
    }

    pub fn is_finished(&self) -> bool {
        self.pump.is_finished()
    }

    /// Wait for the pump to return. Call only after the trace handle has
    /// been closed.
    pub fn join(self, timeout: Duration) -> bool {
        self.pump.join_timeout(timeout)
    }
}

fn run_pump(backend: &dyn TraceBackend, trace: u64) {
    log::debug!("pump started on trace 0x{:X}", trace);
    match backend.process_trace(trace) {
        Ok(()) => log::debug!("pump on trace 0x{:X} returned", trace),
        Err(e) if e.is_shutdown_race() => {
            log::debug!("pump on trace 0x{:X} ended by close: {}", trace, e)
        }
        Err(e) => log::warn!("pump on trace 0x{:X} aborted: {}", trace, e),
    }
}
