use abstutil::prettyprint_usize;
use anyhow::Result;
use chrono::NaiveDateTime;
use geom::{Duration, GPSBounds, LonLat, Pt2D, Time};
use serde::{Deserialize, Serialize};

use crate::VehicleName;

/// One recorded observation of the vehicle, in map-space after the datum transform and
/// projection.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Fix {
    pub pos: Pt2D,
    /// On the recording's own timeline; the first record of the log is at START_OF_DAY
    pub time: Time,
}

/// The full recorded trajectory of one vehicle. Built once from the source log, never mutated
/// afterwards.
#[derive(Clone, Serialize, Deserialize)]
pub struct Track {
    vehicle: Option<VehicleName>,
    inner: Vec<Fix>,
}

impl Track {
    /// Fix times must strictly increase; the loader already drops records violating that, but
    /// tracks built in code get checked here.
    pub fn new(vehicle: Option<VehicleName>, fixes: Vec<Fix>) -> Result<Self> {
        if fixes.is_empty() {
            bail!("Track has no fixes");
        }
        for pair in fixes.windows(2) {
            if pair[1].time <= pair[0].time {
                bail!(
                    "Track input out-of-order: {} then {}",
                    pair[0].time,
                    pair[1].time
                );
            }
        }
        Ok(Self {
            vehicle,
            inner: fixes,
        })
    }

    pub fn vehicle(&self) -> Option<&VehicleName> {
        self.vehicle.as_ref()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn fix(&self, idx: usize) -> &Fix {
        &self.inner[idx]
    }

    pub fn fixes(&self) -> &[Fix] {
        &self.inner
    }

    pub fn start_time(&self) -> Time {
        self.inner[0].time
    }

    pub fn end_time(&self) -> Time {
        self.inner.last().unwrap().time
    }
}

/// Parses a raw delimited position log into a Track.
///
/// Each non-empty line is comma-separated `id,timestamp,longitude,latitude,...`; trailing
/// fields are ignored. Records that don't parse (or that go backwards in time) are skipped
/// with a warning, but an entirely unusable log is an error. `datum` maps the log's native
/// lon/lat into the display datum before anything is stored; it's supplied by whatever map
/// host draws the result, so pass the identity closure if there's no shift to apply.
pub fn load<R: std::io::Read, F: Fn(f64, f64) -> (f64, f64)>(
    reader: R,
    datum: F,
) -> Result<(Track, GPSBounds)> {
    let mut vehicle: Option<VehicleName> = None;
    let mut raw: Vec<(LonLat, NaiveDateTime)> = Vec::new();
    let mut skipped = 0;

    for rec in csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .records()
    {
        let rec = match rec {
            Ok(rec) => rec,
            Err(err) => {
                warn!("Skipping unreadable line: {}", err);
                skipped += 1;
                continue;
            }
        };
        match parse_record(&rec, &datum) {
            Ok((id, pos, datetime)) => {
                if vehicle.is_none() {
                    vehicle = Some(id);
                }
                if let Some((_, last)) = raw.last() {
                    if datetime <= *last {
                        warn!(
                            "Skipping fix at {}; it's not after the previous fix at {}",
                            datetime, last
                        );
                        skipped += 1;
                        continue;
                    }
                }
                raw.push((pos, datetime));
            }
            Err(err) => {
                warn!("Skipping {:?}: {}", rec, err);
                skipped += 1;
            }
        }
    }

    if raw.is_empty() {
        bail!("No usable fixes in the log ({} records skipped)", skipped);
    }

    let mut gps_bounds = GPSBounds::new();
    for (pos, _) in &raw {
        gps_bounds.update(*pos);
    }

    // Times in the log are absolute; the track's timeline starts at its first record.
    let start = raw[0].1;
    let mut fixes = Vec::new();
    for (pos, datetime) in &raw {
        let since_start = (*datetime - start).num_milliseconds() as f64 / 1000.0;
        fixes.push(Fix {
            pos: pos.to_pt(&gps_bounds),
            time: Time::START_OF_DAY + Duration::seconds(since_start),
        });
    }

    let track = Track::new(vehicle, fixes)?;
    info!(
        "Loaded {} fixes for {:?} spanning {} ({} records skipped)",
        prettyprint_usize(track.len()),
        track.vehicle(),
        track.end_time() - track.start_time(),
        prettyprint_usize(skipped)
    );
    dump_coverage(&gps_bounds);

    Ok((track, gps_bounds))
}

fn parse_record<F: Fn(f64, f64) -> (f64, f64)>(
    rec: &csv::StringRecord,
    datum: &F,
) -> Result<(VehicleName, LonLat, NaiveDateTime)> {
    if rec.len() < 4 {
        bail!("expected at least 4 fields, got {}", rec.len());
    }
    let datetime = parse_timestamp(&rec[1])?;
    let lon: f64 = rec[2].parse()?;
    let lat: f64 = rec[3].parse()?;
    let (lon, lat) = datum(lon, lat);
    Ok((VehicleName(rec[0].to_string()), LonLat::new(lon, lat), datetime))
}

// The logs aren't consistent about how they write timestamps
fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
    ] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(datetime);
        }
    }
    bail!("unknown timestamp format {}", raw)
}

// Log the area the track covers, in a form that's easy to paste into geojson.io
fn dump_coverage(gps_bounds: &GPSBounds) {
    use geojson::{Feature, GeoJson};

    let gj = GeoJson::Feature(Feature {
        bbox: None,
        geometry: Some(
            gps_bounds
                .to_bounds()
                .get_rectangle()
                .to_geojson(Some(gps_bounds)),
        ),
        id: None,
        properties: None,
        foreign_members: None,
    });
    info!(
        "GeoJSON covering the track: {}",
        serde_json::to_string(&gj).unwrap()
    );
}
