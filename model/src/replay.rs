use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use geom::{Distance, Duration, Time};
use parking_lot::RwLock;

use crate::{EstimateEntry, EstimateHistory, Track, Velocity};

/// Replays a track at the pace it was originally recorded, appending each fix (with a derived
/// velocity) to the shared history as it "arrives". The appends all happen on one background
/// thread, as a chain of one-shot sleeps; a delayed tick just delays the rest of the chain,
/// it never overlaps the next one.
pub struct Replay {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Replay {
    /// Seeds the history with the track's first fix (zero velocity) and schedules the rest.
    pub fn start(track: Track, history: Arc<RwLock<EstimateHistory>>, height: Distance) -> Replay {
        seed(&track, &history, height);

        let (cancel, cancelled) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let mut cursor = 1;
            while cursor < track.len() {
                let delay = track.fix(cursor).time - track.fix(cursor - 1).time;
                match cancelled.recv_timeout(to_std(delay)) {
                    // The next fix has now "arrived"
                    Err(RecvTimeoutError::Timeout) => {
                        cursor = advance(&track, cursor, &history, height);
                    }
                    // Stopped (or the Replay handle was dropped) while sleeping
                    _ => {
                        return;
                    }
                }
            }
            info!(
                "Replay of {:?} finished; all {} fixes arrived",
                track.vehicle(),
                track.len()
            );
        });

        Replay {
            cancel: Some(cancel),
            handle: Some(handle),
        }
    }

    /// True once the scheduler thread has wound down -- every fix arrived, or the replay was
    /// stopped early.
    pub fn is_finished(&self) -> bool {
        match self.handle {
            Some(ref handle) => handle.is_finished(),
            None => true,
        }
    }

    /// Cancels the pending arrival, if any. Nothing is appended afterwards.
    pub fn stop(&mut self) {
        // Dropping the channel wakes the scheduler's sleep immediately
        self.cancel = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Replay {
    fn drop(&mut self) {
        self.stop();
    }
}

fn seed(track: &Track, history: &RwLock<EstimateHistory>, height: Distance) {
    history.write().push(EstimateEntry {
        pos: track.fix(0).pos,
        height,
        time: track.fix(0).time,
        vel: Velocity::ZERO,
    });
}

/// Appends fix `cursor` to the history and bumps the cursor. The velocity is the finite
/// difference from the previous fix.
fn advance(
    track: &Track,
    cursor: usize,
    history: &RwLock<EstimateHistory>,
    height: Distance,
) -> usize {
    let prev = track.fix(cursor - 1);
    let fix = track.fix(cursor);
    history.write().push(EstimateEntry {
        pos: fix.pos,
        height,
        time: fix.time,
        vel: Velocity::between(prev, fix),
    });
    cursor + 1
}

fn to_std(duration: Duration) -> std::time::Duration {
    std::time::Duration::from_secs_f64(duration.inner_seconds().max(0.0))
}

/// Maps the recording's timeline onto "now". Anchored once when the replay starts, so pacing
/// stays stable even if the system clock is adjusted mid-run.
pub struct ReplayClock {
    anchor: Instant,
    start: Time,
}

impl ReplayClock {
    pub fn new(start: Time) -> ReplayClock {
        ReplayClock {
            anchor: Instant::now(),
            start,
        }
    }

    /// The current moment on the recording's timeline.
    pub fn now(&self) -> Time {
        self.start + Duration::seconds(self.anchor.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fix, Track};
    use geom::Pt2D;

    fn track(fixes: Vec<(f64, f64, f64)>) -> Track {
        Track::new(
            None,
            fixes
                .into_iter()
                .map(|(x, y, t)| Fix {
                    pos: Pt2D::new(x, y),
                    time: Time::START_OF_DAY + Duration::seconds(t),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn advance_appends_exact_velocities_in_order() {
        let track = track(vec![
            (0.0, 0.0, 0.0),
            (10.0, 0.0, 10.0),
            (30.0, 0.0, 20.0),
        ]);
        let history = RwLock::new(EstimateHistory::new());
        let height = Distance::meters(5.0);

        seed(&track, &history, height);
        let mut cursor = 1;
        cursor = advance(&track, cursor, &history, height);
        cursor = advance(&track, cursor, &history, height);
        assert_eq!(cursor, 3);

        let history = history.into_inner();
        assert_eq!(history.len(), 3);
        let entries = history.entries();
        for (entry, fix) in entries.iter().zip(track.fixes()) {
            assert_eq!(entry.time, fix.time);
            assert_eq!(entry.pos, fix.pos);
            assert_eq!(entry.height, height);
        }
        assert_eq!(entries[0].vel, Velocity::ZERO);
        assert_eq!(entries[1].vel, Velocity { x: 1.0, y: 0.0 });
        assert_eq!(entries[2].vel, Velocity { x: 2.0, y: 0.0 });
    }

    #[test]
    fn replay_stops_at_the_end_of_the_track() {
        let track = track(vec![(0.0, 0.0, 0.0), (1.0, 0.0, 0.01), (3.0, 0.0, 0.03)]);
        let history = Arc::new(RwLock::new(EstimateHistory::new()));
        let replay = Replay::start(track, history.clone(), Distance::meters(10.0));

        // Generous; the gaps only add up to 30ms
        std::thread::sleep(std::time::Duration::from_millis(500));
        assert!(replay.is_finished());
        assert_eq!(history.read().len(), 3);

        // And nothing else ever shows up
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(history.read().len(), 3);
    }

    #[test]
    fn stop_cancels_the_pending_arrival() {
        let track = track(vec![(0.0, 0.0, 0.0), (1.0, 0.0, 30.0)]);
        let history = Arc::new(RwLock::new(EstimateHistory::new()));
        let mut replay = Replay::start(track, history.clone(), Distance::meters(10.0));

        // This would hang for 30 seconds if the sleep wasn't cancellable
        replay.stop();
        assert!(replay.is_finished());
        assert_eq!(history.read().len(), 1);
    }

    #[test]
    fn clock_starts_at_the_track_time_and_advances() {
        let start = Time::START_OF_DAY + Duration::seconds(5.0);
        let clock = ReplayClock::new(start);
        let t1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let t2 = clock.now();
        assert!(t1 >= start);
        assert!(t2 > t1);
    }
}
