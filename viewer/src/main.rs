//! A headless stand-in for the rendering host: load a track, replay it live, and ask once per
//! frame where the vehicle is. A real map frontend would feed the pose to its scene instead
//! of the log.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use abstutil::prettyprint_usize;
use anyhow::Result;
use geom::{Distance, Duration, GPSBounds};
use structopt::StructOpt;

use model::{Track, Vehicle};

#[derive(StructOpt)]
struct Args {
    /// The path to a raw position log, one `id,timestamp,lon,lat,...` record per line
    #[structopt(long)]
    track: String,
    /// Height to draw the vehicle at, in meters
    #[structopt(long, default_value = "10.0")]
    height: f64,
    /// How many times per second to ask for the vehicle's position
    #[structopt(long, default_value = "10.0")]
    fps: f64,
}

fn main() -> Result<()> {
    abstutil::logger::setup();
    let args = Args::from_iter(abstutil::cli_args());

    // The datum shift belongs to whatever map host draws the result; plain WGS84 here.
    // TODO A bounded retry with backoff would help when the log lives on a flaky mount
    let (track, gps_bounds) = model::load(fs_err::File::open(&args.track)?, |lon, lat| (lon, lat))?;

    run(track, gps_bounds, args)
}

fn run(track: Track, gps_bounds: GPSBounds, args: Args) -> Result<()> {
    if args.fps <= 0.0 {
        bail!("--fps must be positive");
    }
    // Give the displayed position a little tail to converge after the last fix
    let total = (track.end_time() - track.start_time()) + Duration::seconds(2.0);
    let mut vehicle = Vehicle::start(track, Distance::meters(args.height));

    let frame_gap = std::time::Duration::from_secs_f64(1.0 / args.fps);
    let deadline = std::time::Instant::now() + to_std(total);
    let mut frames = 0;

    while std::time::Instant::now() < deadline {
        let pose = vehicle.pose_now();
        let gps = pose.pos.to_gps(&gps_bounds);
        info!(
            "at ({:.6}, {:.6}), height {}, heading {:.1} degrees",
            gps.x(),
            gps.y(),
            pose.height,
            pose.heading.to_degrees()
        );
        frames += 1;
        std::thread::sleep(frame_gap);
    }

    info!(
        "Drew {} frames; replay finished: {}",
        prettyprint_usize(frames),
        vehicle.is_replay_finished()
    );
    vehicle.stop();
    Ok(())
}

fn to_std(duration: Duration) -> std::time::Duration {
    std::time::Duration::from_secs_f64(duration.inner_seconds().max(0.0))
}
