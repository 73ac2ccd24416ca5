//! Shared tracing setup for warden binaries.

pub mod logging;

pub use logging::LogFormat;

/// Initialize process-wide logging from the environment.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    logging::init(LogFormat::from_env());
}
