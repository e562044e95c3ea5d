//! Fluent builder for Runtime construction.
//!
//! Provides a builder pattern interface for creating and configuring Runtime instances.

use crate::runtime::Runtime;

use std::time::{Duration, Instant};

/// Frame delay of the host loop when no timer is due sooner (~60 Hz).
pub(crate) const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Builder for constructing Runtime instances with fluent API.
///
/// # Example
/// ```ignore
/// let rt = RuntimeBuilder::new()
///     .frame_interval(Duration::from_millis(8))
///     .build();
/// ```
pub struct RuntimeBuilder {
    start_time: Option<Instant>,
    frame_interval: Duration,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    /// Creates a new runtime builder with the default settings.
    pub fn new() -> Self {
        Self {
            start_time: None,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }

    /// Sets the initial reading of the runtime's clock.
    ///
    /// Hosts that feed [`Runtime::tick`] with their own timestamps (replays,
    /// tests, fixed-step simulations) should start the clock at their epoch.
    /// Defaults to `Instant::now()` at build time.
    pub fn start_time(mut self, start: Instant) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Sets the longest time [`Runtime::run`] sleeps between two ticks.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Builds and returns a configured Runtime instance.
    ///
    /// Consumes the builder and constructs a Runtime with the current configuration.
    ///
    /// # Example
    /// ```ignore
    /// let rt = RuntimeBuilder::new().build();
    /// ```
    pub fn build(self) -> Runtime {
        let start = self.start_time.unwrap_or_else(Instant::now);
        Runtime::with_config(start, self.frame_interval)
    }
}
