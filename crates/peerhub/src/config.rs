//! Hub configuration

use std::time::Duration;

/// Tunables for the hub. Defaults match the production protocol
/// constants; tests shrink the windows.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum request body size in bytes
    pub body_limit: usize,
    /// How long a caller blocks waiting for a response
    pub call_timeout: Duration,
    /// Keep-alive comment interval on stream sessions
    pub heartbeat: Duration,
    /// Replay window for subscription timestamps
    pub subscription_max_age: Duration,
    /// Rate-limit refill, tokens per second per identity
    pub rate: f64,
    /// Rate-limit burst capacity per identity
    pub burst: f64,
    /// Idle rate-limit buckets are evicted after this long
    pub idle_expiry: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            body_limit: 100 << 10,
            call_timeout: Duration::from_secs(15),
            heartbeat: Duration::from_secs(5),
            subscription_max_age: Duration::from_secs(30),
            rate: 10.0,
            burst: 1000.0,
            idle_expiry: Duration::from_secs(3 * 60),
        }
    }
}
