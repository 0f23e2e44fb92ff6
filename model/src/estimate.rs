use geom::{Distance, Duration, Pt2D, Time};

use crate::{EstimateHistory, Velocity};

/// How far over the last known speed the displayed vehicle may go while catching up to where
/// it should be.
const CATCHUP_ALLOWANCE: f64 = 1.2;
/// Floor for the time since the last query, to keep the catch-up speed finite.
const MIN_QUERY_GAP: f64 = 1.0 / 1000.0;

/// Where to draw the vehicle: map-space position, a constant height above the surface, and
/// heading in radians from the +y axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayPose {
    pub pos: Pt2D,
    pub height: Distance,
    pub heading: f64,
}

/// Smoothing state for one vehicle's displayed position. This belongs to whoever draws
/// frames; the replay scheduler never sees it.
pub struct EstimatorState {
    last: Option<(Pt2D, Time)>,
}

impl EstimatorState {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Maps "now" to a pose that keeps moving between sparse fixes and never snaps when a
    /// fresh fix disagrees with what was last drawn. The displayed position chases the
    /// extrapolated target, but the correction speed is capped at CATCHUP_ALLOWANCE times the
    /// last known speed, so the drawn trail converges without teleporting. Never fails;
    /// degenerate histories map to default poses.
    pub fn estimate(&mut self, now: Time, history: &EstimateHistory) -> DisplayPose {
        let latest = match history.latest() {
            Some(entry) => entry,
            None => {
                // Nothing has arrived yet
                return DisplayPose {
                    pos: Pt2D::zero(),
                    height: Distance::ZERO,
                    heading: 0.0,
                };
            }
        };
        if history.len() == 1 {
            // No velocity to work with, so no smoothing state yet either
            return DisplayPose {
                pos: latest.pos,
                height: latest.height,
                heading: 0.0,
            };
        }

        let (last_pos, last_time) = *self.last.get_or_insert((latest.pos, latest.time));

        // Where the vehicle should be if it kept its last known velocity
        let target = project(latest.pos, latest.vel, now - latest.time);
        let dx = target.x() - last_pos.x();
        let dy = target.y() - last_pos.y();

        let mut dt = (now - last_time).inner_seconds();
        if dt == 0.0 {
            dt = MIN_QUERY_GAP;
        }

        let catchup_speed = dx.hypot(dy) / dt;
        let max_speed = CATCHUP_ALLOWANCE * latest.vel.magnitude();
        let factor = if catchup_speed <= max_speed {
            1.0
        } else {
            max_speed / catchup_speed
        };

        let pos = Pt2D::new(last_pos.x() + dx * factor, last_pos.y() + dy * factor);
        self.last = Some((pos, now));
        DisplayPose {
            pos,
            height: latest.height,
            heading: latest.vel.heading(),
        }
    }
}

fn project(pos: Pt2D, vel: Velocity, elapsed: Duration) -> Pt2D {
    let secs = elapsed.inner_seconds();
    Pt2D::new(pos.x() + vel.x * secs, pos.y() + vel.y * secs)
}
