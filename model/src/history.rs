use geom::{Distance, Pt2D, Time};

use crate::Fix;

/// Finite-difference velocity between two consecutive fixes, in map-space meters per second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { x: 0.0, y: 0.0 };

    /// The track's strict time ordering keeps the denominator positive.
    pub fn between(fix1: &Fix, fix2: &Fix) -> Velocity {
        let dt = (fix2.time - fix1.time).inner_seconds();
        Velocity {
            x: (fix2.pos.x() - fix1.pos.x()) / dt,
            y: (fix2.pos.y() - fix1.pos.y()) / dt,
        }
    }

    pub fn magnitude(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Heading in radians, measured from the +y axis rather than the +x axis. That's the
    /// convention of the rendering hosts this feeds; don't swap the arguments.
    pub fn heading(self) -> f64 {
        self.x.atan2(self.y)
    }
}

/// One fix the replay has reached, augmented with the velocity that got the vehicle there.
/// Height is a constant display offset fixed when the entry is created.
#[derive(Clone, Copy, Debug)]
pub struct EstimateEntry {
    pub pos: Pt2D,
    pub height: Distance,
    pub time: Time,
    pub vel: Velocity,
}

/// Everything known about the vehicle so far. Append-only, in time order; the replay
/// scheduler is the only writer.
pub struct EstimateHistory {
    entries: Vec<EstimateEntry>,
}

impl EstimateHistory {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: EstimateEntry) {
        if let Some(last) = self.entries.last() {
            assert!(
                entry.time >= last.time,
                "history went backwards: {} then {}",
                last.time,
                entry.time
            );
        }
        self.entries.push(entry);
    }

    pub fn latest(&self) -> Option<&EstimateEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[EstimateEntry] {
        &self.entries
    }
}
