//! Pure mapping from a session snapshot plus a wall-clock instant to a point
//! on the breathing square. Sampled at frame rate by the presentation layer;
//! never mutates anything.

use serde::Serialize;
use std::time::Instant;

use super::state::{Phase, SessionSnapshot};

/// Corners of the unit square, origin bottom-left, y pointing up. The
/// indicator travels clockwise: Inhale rises along the left edge, Hold
/// crosses the top, Exhale falls down the right, Wait returns along the
/// bottom. The mapping is fixed; inhale being the rising edge is the point.
const CORNERS: [(f64, f64); 4] = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)];

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSample {
    /// Edge being traversed; identical to the current phase.
    pub edge: Phase,
    /// How far along that edge, 0 at phase entry to 1 at the next corner.
    pub fraction: f64,
    /// Position on the unit square.
    pub point: (f64, f64),
}

/// Endpoints of the edge a phase traverses.
pub fn edge_endpoints(phase: Phase) -> ((f64, f64), (f64, f64)) {
    let from = CORNERS[phase.index()];
    let to = CORNERS[(phase.index() + 1) % 4];
    (from, to)
}

/// Interpolate the indicator position at `now`.
///
/// The countdown only moves once per second; the sub-second remainder comes
/// from how long ago the last tick fired. The fraction is clamped so a sample
/// taken slightly after the next tick was due (scheduler jitter) still sits
/// at the corner instead of overshooting the edge.
pub fn sample(snapshot: &SessionSnapshot, now: Instant) -> ProgressSample {
    let phase_secs = f64::from(snapshot.phase_secs.max(1));
    let since_tick = snapshot
        .last_tick
        .map(|tick| now.saturating_duration_since(tick).as_secs_f64())
        .unwrap_or(0.0);

    let effective_countdown = (f64::from(snapshot.countdown) - since_tick).max(0.0);
    let fraction = ((phase_secs - effective_countdown) / phase_secs).clamp(0.0, 1.0);

    let (from, to) = edge_endpoints(snapshot.phase);
    let point = (
        from.0 + (to.0 - from.0) * fraction,
        from.1 + (to.1 - from.1) * fraction,
    );

    ProgressSample {
        edge: snapshot.phase,
        fraction,
        point,
    }
}
