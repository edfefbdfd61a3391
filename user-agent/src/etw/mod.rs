//! Real-time capture of Microsoft-Windows-Kernel-File events.
//!
//! Data path: OS callback → [`RecordSink`] → [`EventDecoder`] → bounded
//! channel → drain thread → [`EventLog`]. [`TraceSessionController`] owns the
//! whole chain and tears it down in reverse order.

pub mod backend;
pub mod collector;
pub mod decoder;
pub mod error;
pub mod event_log;
pub mod process;
pub mod sessions;
#[cfg(windows)]
pub mod win32;
pub mod worker;

pub use backend::{ProviderSpec, SessionProperties, TraceBackend, UnsupportedBackend, platform_backend};
pub use collector::{EventCollector, RecordSink};
pub use decoder::EventDecoder;
pub use error::EtwError;
pub use event_log::{EventLog, LogStats};
pub use process::{ImageNameSource, NoImageNames, ProcessNameResolver};
pub use sessions::{SessionOptions, SessionState, TraceSession, TraceSessionController};
