//! Failure kinds of the ETW primitives.
//!
//! Session/provider/trace failures are terminal for one `start()` attempt.
//! Decode and name-resolution failures never appear here: they are expected
//! per-record outcomes and are expressed as `Option` in the decoder.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtwError {
    #[error("session '{0}' already exists")]
    AlreadyExists(String),

    #[error("StartTrace for '{name}' failed with code {code}")]
    SessionStart { name: String, code: u32 },

    #[error("EnableTraceEx2 failed with code {0}")]
    ProviderEnable(u32),

    #[error("OpenTrace for '{0}' returned an invalid handle")]
    TraceOpen(String),

    #[error("ProcessTrace ended with code {0}")]
    ProcessTrace(u32),

    #[error("{op} failed with code {code}")]
    Control { op: &'static str, code: u32 },

    #[error("session name '{0}' is empty or contains a NUL")]
    InvalidName(String),

    #[error("kernel file tracing is not available on this platform")]
    Unsupported,
}

impl EtwError {
    /// `true` for the outcomes the collector thread treats as a normal end of
    /// the pump (trace handle closed underneath it).
    pub fn is_shutdown_race(&self) -> bool {
        matches!(
            self,
            EtwError::ProcessTrace(code)
                if *code == shared::ERROR_CANCELLED || *code == shared::ERROR_INVALID_HANDLE
        )
    }
}
