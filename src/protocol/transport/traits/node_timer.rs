//! Time source abstraction providing the timing primitives required by poll
//! timeouts and listen-only dwell tracking.
use embassy_time::{Duration, Instant};

/// Monotonic clock plus asynchronous delay.
pub trait NodeTimer {
    /// Current monotonic time.
    fn now(&self) -> Instant;
    /// Asynchronously wait for `duration`.
    fn delay<'a>(&'a mut self, duration: Duration) -> impl core::future::Future<Output = ()> + 'a;
}
