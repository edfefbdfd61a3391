// src/lib.rs
// ────────────────────────────────────────────────────────────────────────────
// Kernel file-event capture library, shared by the `persistmon` driver,
// `etw_dump` and the integration tests.

pub mod macros;

pub mod comms;
pub mod config;
pub mod etw;
pub mod monitor;
pub mod summary;

pub use monitor::FileMonitor;
pub use summary::{ChangeSummary, FileRisk, summarize};
