//! Data crossing the boundary between the ETW pump thread and its consumers.

pub mod events;

pub use events::{FileEvent, FileEventKind};
