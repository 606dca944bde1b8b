use std::time::Duration;

/// Broker configuration.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Name of this consumer, attached to every log record of the broker.
    pub consumer: String,
    /// Backoff applied by the resilient publisher between attempts.
    pub retry: RetryPolicy,
    /// Events buffered per consume stream before the pump waits for the reader.
    pub consume_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            consumer: "user-service".to_string(),
            retry: RetryPolicy::default(),
            consume_buffer: 100,
        }
    }
}

/// Exponential backoff between two publish attempts.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Starts a new backoff sequence.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_interval.min(self.max_interval),
            policy: *self,
        }
    }
}

#[derive(Debug)]
pub struct Backoff {
    next: Duration,
    policy: RetryPolicy,
}

impl Backoff {
    /// Returns the delay to wait before the next attempt and grows the following one.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        let multiplier = if self.policy.multiplier.is_finite() {
            self.policy.multiplier.max(1.0)
        } else {
            1.0
        };
        self.next = Duration::try_from_secs_f64(current.as_secs_f64() * multiplier)
            .unwrap_or(self.policy.max_interval)
            .min(self.policy.max_interval);
        current
    }
}

/// Dispatcher configuration.
#[derive(Clone, Copy, Debug)]
pub struct DispatcherConfig {
    /// Handler invocations allowed in flight for a single dispatched event.
    pub max_concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 100,
        }
    }
}

/// Read-model synchronizer configuration.
#[derive(Clone, Copy, Debug)]
pub struct CatchUpConfig {
    /// Deadline of a single read-store call.
    pub timeout: Duration,
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}
