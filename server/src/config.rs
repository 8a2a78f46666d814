//! Server tuning knobs

use shared::SPAWN_PROTECTION_SECS;
use std::time::{Duration, TryFromFloatSecsError};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of concurrent sessions
    pub max_clients: usize,
    /// Apples kept alive in the arena
    pub apple_count: usize,
    /// Length of the post-spawn invulnerability window
    pub protection: Duration,
    /// Silence after which a session is dropped
    pub client_timeout: Duration,
    /// How often idle sessions are swept
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 32,
            apple_count: 1,
            protection: Duration::from_secs_f32(SPAWN_PROTECTION_SECS),
            client_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Converts a protection length given in seconds. Negative values mean no
/// protection; values a `Duration` cannot hold are refused.
pub fn protection_from_secs(secs: f32) -> Result<Duration, TryFromFloatSecsError> {
    Duration::try_from_secs_f32(secs.max(0.0))
}
