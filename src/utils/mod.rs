pub mod graceful_shutdown;
pub mod inflight;

pub use graceful_shutdown::{GracefulShutdown, ShutdownReason, ShutdownToken};
pub use inflight::{InflightGuard, InflightTracker};
