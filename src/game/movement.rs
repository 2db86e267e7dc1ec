//! Movement plausibility checks

use crate::util::time::elapsed_secs;
use crate::ws::protocol::Vec3;

use super::map::ArenaMap;

/// Why a claimed position was refused
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum MoveRejection {
    #[error("moved {distance:.1} units, at most {allowed:.1} allowed")]
    TooFast { distance: f32, allowed: f32 },

    #[error("position is inside a wall or off the map")]
    Blocked,

    #[error("position is not a finite number")]
    NonFinite,
}

/// Speed check: straight-line 3D displacement against `max_speed * elapsed`.
/// The bound is inclusive.
pub fn validate(
    previous: &Vec3,
    claimed: &Vec3,
    elapsed_secs: f32,
    max_speed: f32,
) -> Result<(), MoveRejection> {
    if !claimed.is_finite() {
        return Err(MoveRejection::NonFinite);
    }
    let distance = previous.distance(claimed);
    let allowed = max_speed * elapsed_secs.max(0.0);
    if distance > allowed {
        return Err(MoveRejection::TooFast { distance, allowed });
    }
    Ok(())
}

/// Per-update validator combining the speed bound with grid collision
#[derive(Debug, Clone, Copy)]
pub struct MovementValidator {
    pub max_speed: f32,
    /// Floor on the elapsed window, absorbs packets bunched by jitter
    pub min_window_ms: u64,
}

impl MovementValidator {
    pub fn new(max_speed: f32, min_window_ms: u64) -> Self {
        Self {
            max_speed,
            min_window_ms,
        }
    }

    /// `last_sample_at` is the time of the connection's previous update
    /// (seeded at join, so the first update has a finite window).
    /// Collision looks at the claimed endpoint only; the path between the
    /// two positions is not swept.
    pub fn check(
        &self,
        map: &ArenaMap,
        previous: &Vec3,
        claimed: &Vec3,
        last_sample_at: u64,
        now: u64,
    ) -> Result<(), MoveRejection> {
        let window = elapsed_secs(last_sample_at, now).max(self.min_window_ms as f32 / 1000.0);
        validate(previous, claimed, window, self.max_speed)?;
        if map.is_blocked(claimed) {
            return Err(MoveRejection::Blocked);
        }
        Ok(())
    }
}
