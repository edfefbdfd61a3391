//! Constants shared between the capture library and its tools.
//!
//! Everything here describes the fixed contract with the OS: provider and
//! session identities, Kernel-File event ids, ETW control codes and the
//! static filtering tables used by the decoder.

pub mod constants;

pub use constants::*;
