//! Logging setup shared by the daemon and its CLI. Deliberately thin: the
//! rest of the control plane reaches for `tracing` directly and only comes
//! here once, at startup, to pick a format.

pub mod logging;

pub use logging::{init_logging, init_logging_json};
