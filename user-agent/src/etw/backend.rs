//! Seam between the session controller and the OS tracing API.
//!
//! `TraceBackend` exposes exactly the primitives the controller consumes.
//! The Windows implementation lives in `win32.rs`; other platforms get
//! [`UnsupportedBackend`], which makes every `start()` fall back to
//! degraded mode.

use std::sync::Arc;

use super::collector::RecordSink;
use super::error::EtwError;
use shared::constants::*;

/// Buffer geometry requested when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProperties {
    pub session_guid: GuidParts,
    pub buffer_size_kb: u32,
    pub min_buffers: u32,
    pub max_buffers: u32,
    pub flush_timer_secs: u32,
    pub real_time: bool,
}

impl Default for SessionProperties {
    fn default() -> Self {
        Self {
            session_guid: SESSION_GUID,
            buffer_size_kb: BUFFER_SIZE_KB,
            min_buffers: MIN_BUFFERS,
            max_buffers: MAX_BUFFERS,
            flush_timer_secs: FLUSH_TIMER_SECS,
            real_time: true,
        }
    }
}

/// Provider enablement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    pub guid: GuidParts,
    pub level: u8,
    pub keywords: u64,
}

impl ProviderSpec {
    /// Microsoft-Windows-Kernel-File at verbose level, every keyword.
    pub fn kernel_file() -> Self {
        Self {
            guid: KERNEL_FILE_PROVIDER_GUID,
            level: TRACE_LEVEL_VERBOSE,
            keywords: ALL_KEYWORDS,
        }
    }
}

/// OS tracing primitives. Handles are opaque `u64`s: `0` means "no session",
/// [`INVALID_PROCESSTRACE_HANDLE`] means "no trace".
pub trait TraceBackend: Send + Sync + 'static {
    /// Stop whatever session is registered under `name`.
    fn stop_session(&self, name: &str) -> Result<(), EtwError>;

    /// Create a real-time session. Must return [`EtwError::AlreadyExists`]
    /// when a session with the same name is still registered.
    fn start_session(&self, name: &str, props: &SessionProperties) -> Result<u64, EtwError>;

    fn enable_provider(&self, session: u64, provider: &ProviderSpec) -> Result<(), EtwError>;

    fn disable_provider(&self, session: u64, provider: &ProviderSpec) -> Result<(), EtwError>;

    /// Open a real-time trace on `name` whose records are delivered to `sink`.
    /// The caller keeps `sink` alive until after `close_trace` and the pump
    /// thread has finished.
    fn open_trace(&self, name: &str, sink: &Arc<RecordSink>) -> Result<u64, EtwError>;

    /// Blocking pump: delivers records to the sink until the trace is closed.
    fn process_trace(&self, trace: u64) -> Result<(), EtwError>;

    fn close_trace(&self, trace: u64) -> Result<(), EtwError>;
}

/// Backend for platforms without ETW.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl TraceBackend for UnsupportedBackend {
    fn stop_session(&self, _name: &str) -> Result<(), EtwError> {
        Err(EtwError::Unsupported)
    }

    fn start_session(&self, _name: &str, _props: &SessionProperties) -> Result<u64, EtwError> {
        Err(EtwError::Unsupported)
    }

    fn enable_provider(&self, _session: u64, _provider: &ProviderSpec) -> Result<(), EtwError> {
        Err(EtwError::Unsupported)
    }

    fn disable_provider(&self, _session: u64, _provider: &ProviderSpec) -> Result<(), EtwError> {
        Err(EtwError::Unsupported)
    }

    fn open_trace(&self, _name: &str, _sink: &Arc<RecordSink>) -> Result<u64, EtwError> {
        Err(EtwError::Unsupported)
    }

    fn process_trace(&self, _trace: u64) -> Result<(), EtwError> {
        Err(EtwError::Unsupported)
    }

    fn close_trace(&self, _trace: u64) -> Result<(), EtwError> {
        Err(EtwError::Unsupported)
    }
}

/// The backend for the platform we were compiled for.
#[cfg(windows)]
pub fn platform_backend() -> Arc<dyn TraceBackend> {
    Arc::new(super::win32::Win32Backend)
}

#[cfg(not(windows))]
pub fn platform_backend() -> Arc<dyn TraceBackend> {
    Arc::new(UnsupportedBackend)
}
