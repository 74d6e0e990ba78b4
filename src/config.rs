//! # Dispatcher configuration.
//!
//! Provides [`DispatcherConfig`] centralized settings for the dispatcher runtime.
//!
//! ## Sentinel values
//! - `refresh_interval` below 1ms is clamped to 1ms (a zero interval would spin the actor)
//! - `bus_capacity = 0` is clamped to 1

use std::time::Duration;

/// Smallest refresh interval an actor will ever arm.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Clamps a refresh interval (global or per-runner) to the 1ms floor.
#[inline]
pub(crate) fn clamp_refresh_interval(interval: Duration) -> Duration {
    interval.max(MIN_REFRESH_INTERVAL)
}

/// Global configuration for the dispatcher.
///
/// ## Field semantics
/// - `refresh_interval`: default delay between the end of one refresh poll and the next
///   (a runner may override it via [`Runner::refresh_interval`](crate::Runner::refresh_interval))
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `grace`: maximum wait for actors to terminate in [`Dispatcher::shutdown`](crate::Dispatcher::shutdown)
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Delay between refresh polls of a runner.
    ///
    /// Measured from the completion of the previous poll, so a slow poll never
    /// overlaps with the next one.
    pub refresh_interval: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Maximum time to wait for actors to close their runners on shutdown.
    pub grace: Duration,
}

impl DispatcherConfig {
    /// Returns the refresh interval clamped to a minimum of 1ms.
    #[inline]
    pub fn refresh_interval_clamped(&self) -> Duration {
        clamp_refresh_interval(self.refresh_interval)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a copy with a different refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Returns a copy with a different shutdown grace period.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

impl Default for DispatcherConfig {
    /// Default configuration:
    ///
    /// - `refresh_interval = 1s`
    /// - `bus_capacity = 1024`
    /// - `grace = 60s`
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(1),
            bus_capacity: 1024,
            grace: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = DispatcherConfig::default();
        assert_eq!(cfg.refresh_interval, Duration::from_secs(1));
        assert_eq!(cfg.bus_capacity, 1024);
        assert_eq!(cfg.grace, Duration::from_secs(60));
    }

    #[test]
    fn zero_values_are_clamped() {
        let mut cfg = DispatcherConfig::default().with_refresh_interval(Duration::ZERO);
        cfg.bus_capacity = 0;
        assert_eq!(cfg.refresh_interval_clamped(), Duration::from_millis(1));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
