//! Process-wide `tracing` setup for tracker clients and tests.

pub mod subscriber;

pub use subscriber::{LOG_ENV, LogFormat, init_with};

/// Initialize logging with the default (JSON) format.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init_with(LogFormat::default());
}
