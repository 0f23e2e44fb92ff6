#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod estimate;
mod history;
mod replay;
mod track;

use std::sync::Arc;

use geom::{Distance, Time};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub use self::estimate::{DisplayPose, EstimatorState};
pub use self::history::{EstimateEntry, EstimateHistory, Velocity};
pub use self::replay::{Replay, ReplayClock};
pub use self::track::{load, Fix, Track};

/// The ID from the source log. Only kept for logging; we replay one vehicle at a time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleName(pub String);

/// One vehicle replaying its recorded track as if the recording was happening live.
///
/// The replay appends fixes to the shared history at the pace they were originally recorded;
/// whoever draws frames asks `pose_now` once per frame and always gets something sensible
/// back, even before the first fix arrives or after the track runs out.
pub struct Vehicle {
    pub track: Track,
    pub history: Arc<RwLock<EstimateHistory>>,

    clock: ReplayClock,
    replay: Replay,
    estimator: EstimatorState,
}

impl Vehicle {
    /// Seeds the history with the track's first fix and starts replaying the rest.
    pub fn start(track: Track, height: Distance) -> Vehicle {
        let history = Arc::new(RwLock::new(EstimateHistory::new()));
        let clock = ReplayClock::new(track.start_time());
        let replay = Replay::start(track.clone(), history.clone(), height);
        Vehicle {
            track,
            history,
            clock,
            replay,
            estimator: EstimatorState::new(),
        }
    }

    /// Where to draw the vehicle right now.
    pub fn pose_now(&mut self) -> DisplayPose {
        let now = self.clock.now();
        self.pose_at(now)
    }

    /// Deterministic variant of `pose_now`, for callers driving their own clock.
    pub fn pose_at(&mut self, now: Time) -> DisplayPose {
        self.estimator.estimate(now, &self.history.read())
    }

    /// True once every fix has arrived. Normal end-of-track, not a failure.
    pub fn is_replay_finished(&self) -> bool {
        self.replay.is_finished()
    }

    /// Cancels any pending fix arrivals. The last pose keeps being returned.
    pub fn stop(mut self) {
        self.replay.stop();
    }
}
