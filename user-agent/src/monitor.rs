// src/monitor.rs

//! `FileMonitor`: the surface the rest of the tool talks to.
//!
//! None of these calls fail from the caller's point of view. `start()` returns
//! `false` when capture is unavailable (no privilege, no ETW on this platform)
//! and the caller carries on without file visibility.

use std::sync::Arc;

use crate::comms::events::FileEvent;
use crate::config::MonitorConfig;
use crate::etw::{
    EventDecoder, LogStats, SessionOptions, SessionState, TraceBackend, TraceSessionController,
    platform_backend,
};
use crate::summary::{self, ChangeSummary};

pub struct FileMonitor {
    controller: TraceSessionController,
}

impl FileMonitor {
    /// Monitor on the platform's tracing backend.
    pub fn new(config: &MonitorConfig) -> Self {
        Self::with_backend(platform_backend(), config)
    }

    pub fn with_backend(backend: Arc<dyn TraceBackend>, config: &MonitorConfig) -> Self {
        Self::with_options(backend, config.session_options())
    }

    /// Full control over controller options, settle delays included.
    pub fn with_options(backend: Arc<dyn TraceBackend>, options: SessionOptions) -> Self {
        let decoder = Arc::new(EventDecoder::default());
        Self { controller: TraceSessionController::new(backend, decoder, options) }
    }

    /// Same as [`FileMonitor::with_options`] with a caller-built decoder.
    pub fn with_decoder(
        backend: Arc<dyn TraceBackend>,
        decoder: EventDecoder,
        options: SessionOptions,
    ) -> Self {
        Self { controller: TraceSessionController::new(backend, Arc::new(decoder), options) }
    }

    pub fn start(&mut self) -> bool {
        self.controller.start()
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    pub fn is_active(&self) -> bool {
        self.controller.is_active()
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn controller(&self) -> &TraceSessionController {
        &self.controller
    }

    /// Copy of every event captured so far, in arrival order.
    pub fn snapshot_events(&self) -> Vec<FileEvent> {
        self.controller.log().snapshot()
    }

    /// Empty the log and reset the diagnostic counters.
    pub fn clear_events(&self) {
        self.controller.log().clear();
    }

    pub fn summarize_changes(&self) -> ChangeSummary {
        summary::summarize(&self.snapshot_events())
    }

    pub fn stats(&self) -> LogStats {
        self.controller.log().stats()
    }
}
