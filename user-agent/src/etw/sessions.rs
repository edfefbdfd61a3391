//! ETW session lifecycle for the Kernel-File provider.
//!
//! `TraceSessionController` acquires, in order: the named real-time session,
//! the provider enablement, the event-log drain, the record sink plus the
//! real-time trace handle, and finally the pump thread. `stop()` releases
//! them in the reverse order and keeps going when a step fails.
//!
//! Key responsibilities:
//! - Clear out a session left registered by a crashed run before starting.
//! - Retry session creation once on a name collision, never more.
//! - Roll back everything acquired so far when a start step fails.
//! - Close the trace handle first on stop: it is the only way to unblock the
//!   pump thread.

use std::{mem, sync::Arc, thread, time::Duration};

use log::Level;
use metrics::counter;

use super::backend::{ProviderSpec, SessionProperties, TraceBackend};
use super::collector::{EventCollector, RecordSink};
use super::decoder::EventDecoder;
use super::error::EtwError;
use super::event_log::{EventLog, spawn_drain};
use super::worker::Worker;
use crate::agent_log;
use shared::constants::{DEFAULT_SESSION_NAME, INVALID_PROCESSTRACE_HANDLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Active,
    Stopping,
}

/// Handles of the OS-side resources. `session_handle == 0` and
/// `trace_handle == INVALID_PROCESSTRACE_HANDLE` mean "none".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSession {
    pub session_name: String,
    pub session_handle: u64,
    pub trace_handle: u64,
    pub state: SessionState,
}

impl TraceSession {
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            session_handle: 0,
            trace_handle: INVALID_PROCESSTRACE_HANDLE,
            state: SessionState::Stopped,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session_handle != 0
    }

    pub fn has_trace(&self) -> bool {
        self.trace_handle != 0 && self.trace_handle != INVALID_PROCESSTRACE_HANDLE
    }

    fn reset(&mut self) {
        self.session_handle = 0;
        self.trace_handle = INVALID_PROCESSTRACE_HANDLE;
        self.state = SessionState::Stopped;
    }
}

/// Tunables of the controller that are not part of the OS session itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub session_name: String,
    /// Capacity of the callback → log channel.
    pub channel_capacity: usize,
    /// Upper bound on each thread join in `stop()`.
    pub join_timeout: Duration,
    /// Pause after clearing a stale session.
    pub stale_settle: Duration,
    /// Pause between the collision stop and the single retry.
    pub retry_settle: Duration,
    /// Pause after the pump thread starts, for OS buffer setup.
    pub start_settle: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            session_name: DEFAULT_SESSION_NAME.to_owned(),
            channel_capacity: 65_536,
            join_timeout: Duration::from_secs(3),
            stale_settle: Duration::from_millis(300),
            retry_settle: Duration::from_millis(500),
            start_settle: Duration::from_millis(200),
        }
    }
}

impl SessionOptions {
    /// Same options with every settle delay set to zero.
    pub fn without_settle_delays(mut self) -> Self {
        self.stale_settle = Duration::ZERO;
        self.retry_settle = Duration::ZERO;
        self.start_settle = Duration::ZERO;
        self
    }
}

/// Everything that exists only while a trace is open. Dropped after the pump
/// has returned, so the sink can never be reached by a late callback.
struct LiveCapture {
    sink: Arc<RecordSink>,
    collector: Option<EventCollector>,
    drain: Worker,
}

pub struct TraceSessionController {
    backend: Arc<dyn TraceBackend>,
    provider: ProviderSpec,
    properties: SessionProperties,
    options: SessionOptions,
    decoder: Arc<EventDecoder>,
    log: Arc<EventLog>,
    session: TraceSession,
    live: Option<LiveCapture>,
}

impl TraceSessionController {
    pub fn new(
        backend: Arc<dyn TraceBackend>,
        decoder: Arc<EventDecoder>,
        options: SessionOptions,
    ) -> Self {
        Self {
            backend,
            provider: ProviderSpec::kernel_file(),
            properties: SessionProperties::default(),
            session: TraceSession::new(options.session_name.clone()),
            options,
            decoder,
            log: Arc::new(EventLog::new()),
            live: None,
        }
    }

    pub fn session(&self) -> &TraceSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn is_active(&self) -> bool {
        self.session.state == SessionState::Active
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn decoder(&self) -> &Arc<EventDecoder> {
        &self.decoder
    }

    /// Begin capture. Idempotent while active. `false` means nothing was left
    /// acquired and the caller has no file visibility.
    pub fn start(&mut self) -> bool {
        if self.is_active() {
            return true;
        }
        let name = self.session.session_name.clone();
        agent_log!(Level::Info, "session", "Starting kernel file session '{}'", name);
        self.session.state = SessionState::Starting;

        match self.acquire(&name) {
            Ok(()) => {
                counter!("etw_sessions_started_total").increment(1);
                agent_log!(
                    Level::Info,
                    "session",
                    "Session '{}' active (session=0x{:X}, trace=0x{:X})",
                    name,
                    self.session.session_handle,
                    self.session.trace_handle
                );
                true
            }
            Err(e) => {
                counter!("etw_session_start_failures_total").increment(1);
                agent_log!(Level::Error, "session", "Session '{}' failed to start: {}", name, e);
                false
            }
        }
    }

    fn acquire(&mut self, name: &str) -> Result<(), EtwError> {
        // (a) A crashed run may have left a session registered under our name.
        if let Err(e) = self.backend.stop_session(name) {
            log::debug!("no stale session '{}' to stop: {}", name, e);
        }
        pause(self.options.stale_settle);

        // (b) Create the session, retrying once on a name collision.
        let session = match self.backend.start_session(name, &self.properties) {
            Err(EtwError::AlreadyExists(_)) => {
                agent_log!(Level::Warn, "session", "'{}' still registered; stopping and retrying", name);
                if let Err(e) = self.backend.stop_session(name) {
                    log::warn!("stop before retry failed: {}", e);
                }
                pause(self.options.retry_settle);
                self.backend.start_session(name, &self.properties)
            }
            other => other,
        };
        let session = session.inspect_err(|_| self.session.reset())?;
        self.session.session_handle = session;

        // (c) Provider at verbose level, every keyword.
        if let Err(e) = self.backend.enable_provider(session, &self.provider) {
            self.rollback(name);
            return Err(e);
        }

        // (d) Log drain, sink and trace handle.
        let (sender, drain) = match spawn_drain(self.log.clone(), self.options.channel_capacity) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("cannot spawn log drain: {}", e);
                self.rollback(name);
                return Err(EtwError::TraceOpen(name.to_owned()));
            }
        };
        self.decoder.resolver().clear();
        let sink = Arc::new(RecordSink::new(self.decoder.clone(), sender));
        let trace = match self.backend.open_trace(name, &sink) {
            Ok(trace) => trace,
            Err(e) => {
                drop(sink);
                drain.join_timeout(self.options.join_timeout);
                self.rollback(name);
                return Err(e);
            }
        };
        self.session.trace_handle = trace;

        // (e) Active, then hand the trace to the pump thread.
        self.session.state = SessionState::Active;
        sink.activate();
        let collector = EventCollector::start(self.backend.clone(), trace);
        self.live = Some(LiveCapture { sink, collector: None, drain });
        match collector {
            Ok(collector) => {
                if let Some(live) = self.live.as_mut() {
                    live.collector = Some(collector);
                }
            }
            Err(e) => {
                log::error!("cannot spawn pump thread: {}", e);
                self.stop();
                return Err(EtwError::TraceOpen(name.to_owned()));
            }
        }
        pause(self.options.start_settle);
        Ok(())
    }

    /// Undo (b) and (c) after a failed start.
    fn rollback(&mut self, name: &str) {
        if self.session.has_session() {
            if let Err(e) = self.backend.disable_provider(self.session.session_handle, &self.provider) {
                log::debug!("rollback: disable provider: {}", e);
            }
        }
        if let Err(e) = self.backend.stop_session(name) {
            log::debug!("rollback: stop session: {}", e);
        }
        self.session.reset();
    }

    /// End capture and release everything, in reverse acquisition order.
    /// Safe to call repeatedly, before `start()`, or after a failed start.
    pub fn stop(&mut self) {
        if self.session.state == SessionState::Stopped
            && !self.session.has_session()
            && self.live.is_none()
        {
            return;
        }
        let name = self.session.session_name.clone();
        agent_log!(Level::Info, "session", "Stopping session '{}'", name);
        self.session.state = SessionState::Stopping;

        if let Some(live) = self.live.as_ref() {
            live.sink.deactivate();
        }

        // 1 ▸ trace handle: unblocks the pump.
        if self.session.has_trace() {
            if let Err(e) = self.backend.close_trace(self.session.trace_handle) {
                log::warn!("CloseTrace failed: {}", e);
            }
        }
        self.session.trace_handle = INVALID_PROCESSTRACE_HANDLE;

        // 2 ▸ provider.
        if self.session.has_session() {
            if let Err(e) = self.backend.disable_provider(self.session.session_handle, &self.provider) {
                log::warn!("disable provider failed: {}", e);
            }
        }

        // 3 ▸ session, by name.
        if let Err(e) = self.backend.stop_session(&name) {
            log::warn!("stop session '{}' failed: {}", name, e);
        }

        // 4 ▸ pump thread, then the sink and the log drain behind it.
        if let Some(mut live) = self.live.take() {
            let pump_done = live
                .collector
                .take()
                .map_or(true, |c| c.join(self.options.join_timeout));
            if pump_done {
                drop(live.sink);
                live.drain.join_timeout(self.options.join_timeout);
            } else {
                // The OS may still call into the sink; keep it alive for good.
                agent_log!(Level::Warn, "session", "pump did not exit; leaking record sink");
                mem::forget(live.sink);
            }
        }

        self.session.reset();
        let stats = self.log.stats();
        agent_log!(
            Level::Info,
            "session",
            "Stopped '{}': {} file events kept, {} records seen, {} dropped",
            name,
            stats.accepted,
            stats.seen,
            stats.dropped
        );
    }
}

impl Drop for TraceSessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}
