//! Wall-clock helpers shared by the arena and transport layers

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Seconds between two millisecond timestamps, never negative
pub fn elapsed_secs(earlier_ms: u64, later_ms: u64) -> f32 {
    later_ms.saturating_sub(earlier_ms) as f32 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_secs_saturates() {
        assert_eq!(elapsed_secs(1_000, 2_500), 1.5);
        assert_eq!(elapsed_secs(2_000, 1_000), 0.0);
    }
}
