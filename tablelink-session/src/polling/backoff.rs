use crate::config::PollingConfig;
use std::time::Duration;

/// Exponential interval that grows on failure and snaps back on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(config: &PollingConfig) -> Self {
        let max = config.max_interval.max(config.initial_interval);
        Self {
            initial: config.initial_interval,
            max,
            multiplier: config.multiplier.max(1.0),
            current: config.initial_interval,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Grows the interval and returns the new value.
    pub fn on_failure(&mut self) -> Duration {
        let grown = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max);
        self.current = grown.min(self.max);
        self.current
    }

    pub fn on_success(&mut self) {
        self.current = self.initial;
    }
}
