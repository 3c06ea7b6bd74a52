use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike};
use geo::{GeodesicBearing, GeodesicDestination, GeodesicDistance, Point};
use serde::{Deserialize, Serialize};

/// Smallest cell identifier treated as genuine; OCR noise and zero fall below it
pub const MIN_VALID_CELL_ID: u32 = 99_999;

/// Reaction time between the overlay changing and the survey position sample
pub const COMPENSATION_SECS: f64 = 3.0;

/// One second-indexed observation combining cellular and positional data.
///
/// Producers fill it in stages: the track resampler sets position, motion and
/// time, the screencast reconstructor sets cellular attributes and time, and
/// the merge step combines one of each into a fused record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub survey_id: i64,
    /// 1-based position within the source stream
    pub file_idx: Option<u32>,
    /// True when produced by interpolation rather than observed
    pub calculated: bool,

    pub band: Option<u16>,
    pub cell_id: Option<u32>,
    pub tracking_area_code: Option<u32>,
    pub physical_cell_id: Option<u16>,
    pub carrier: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Degrees, geodesic azimuth towards the next reading
    pub forward_azimuth: Option<f64>,
    /// Degrees, geodesic azimuth from the next reading back to this one
    pub backward_azimuth: Option<f64>,
    /// Meters to the next reading
    pub forward_distance: Option<f64>,
    /// Meters per second
    pub speed: Option<f64>,

    pub reading_time: Option<NaiveDateTime>,
}

impl Reading {
    pub fn new(survey_id: i64) -> Self {
        Self {
            survey_id,
            ..Default::default()
        }
    }

    /// Parse an RFC 3339 timestamp (`Z` or offset, optional fraction) into
    /// naive wall-clock time in `zone`, truncated to the second.
    /// Leaves `reading_time` untouched when the string does not parse.
    pub fn set_reading_time_from_str<Z: TimeZone>(&mut self, datestr: &str, zone: &Z) -> bool {
        let parsed = DateTime::parse_from_rfc3339(datestr.trim())
            .or_else(|_| DateTime::parse_from_str(datestr.trim(), "%Y-%m-%dT%H:%M:%S%.f%z"));
        match parsed {
            Ok(dt) => {
                let local = dt.with_timezone(zone).naive_local();
                self.reading_time = local.with_nanosecond(0);
                true
            }
            Err(_) => false,
        }
    }

    /// Linear interpolation between two observed fixes at `step` of `steps` seconds.
    pub fn interpolated(r1: &Reading, r2: &Reading, step: i64, steps: i64) -> Reading {
        let ratio = step as f64 / steps as f64;
        let lerp = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(a), Some(b)) => Some(a + (b - a) * ratio),
            _ => None,
        };

        Reading {
            survey_id: r1.survey_id,
            file_idx: r1.file_idx,
            calculated: true,
            latitude: lerp(r1.latitude, r2.latitude),
            longitude: lerp(r1.longitude, r2.longitude),
            reading_time: r1.reading_time.map(|t| t + Duration::seconds(step)),
            ..Default::default()
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Position as a geo point (x = longitude, y = latitude)
    pub fn point(&self) -> Option<Point<f64>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Point::new(lon, lat)),
            _ => None,
        }
    }

    /// Fill forward/backward azimuth, forward distance and speed towards `next`.
    ///
    /// Speed stays `None` when either timestamp is missing or no time elapsed.
    pub fn calculate_azimuth_and_speed(&mut self, next: &Reading) {
        let (Some(from), Some(to)) = (self.point(), next.point()) else {
            return;
        };

        let (fwd_azimuth, distance) = from.geodesic_bearing_distance(to);
        self.forward_azimuth = Some(fwd_azimuth);
        self.backward_azimuth = Some(to.geodesic_bearing(from));
        self.forward_distance = Some(distance);
        self.speed = self.speed_towards(next, distance);
    }

    fn speed_towards(&self, next: &Reading, distance: f64) -> Option<f64> {
        let (Some(t1), Some(t2)) = (self.reading_time, next.reading_time) else {
            log::debug!("speed undefined at file_idx {:?}: missing timestamp", self.file_idx);
            return None;
        };
        let elapsed = (t2 - t1).num_milliseconds() as f64 / 1000.0;
        if elapsed == 0.0 {
            log::debug!("speed undefined at file_idx {:?}: zero elapsed time", self.file_idx);
            return None;
        }
        Some(distance / elapsed)
    }

    /// Geodesic distance in meters, if both readings carry coordinates
    pub fn distance_to(&self, other: &Reading) -> Option<f64> {
        Some(self.point()?.geodesic_distance(&other.point()?))
    }

    /// Absolute heading change between two readings, folded into [0, 180]
    pub fn turn_angle(&self, other: &Reading) -> Option<f64> {
        let beta = (self.forward_azimuth? - other.forward_azimuth?).abs();
        Some(beta.min(360.0 - beta))
    }

    /// Copy of this reading shifted back along `backward_azimuth` by
    /// `speed * COMPENSATION_SECS` meters. Returned unchanged when speed,
    /// coordinates or the backward azimuth are missing, or speed is zero.
    pub fn compensated(&self) -> Reading {
        let mut out = self.clone();
        let (Some(speed), Some(azimuth), Some(origin)) =
            (self.speed, self.backward_azimuth, self.point())
        else {
            return out;
        };
        if speed == 0.0 {
            return out;
        }

        let moved = origin.geodesic_destination(azimuth, speed * COMPENSATION_SECS);
        out.latitude = Some(moved.y());
        out.longitude = Some(moved.x());
        out
    }

    /// Copy the overlay-derived cellular attributes of `other` into this reading
    pub fn copy_cellular_from(&mut self, other: &Reading) {
        self.band = other.band;
        self.cell_id = other.cell_id;
        self.tracking_area_code = other.tracking_area_code;
        self.physical_cell_id = other.physical_cell_id;
        self.carrier = other.carrier.clone();
    }

    /// True iff the cell identifier is present and plausibly genuine
    pub fn is_valid(&self) -> bool {
        self.cell_id.map_or(false, |id| id >= MIN_VALID_CELL_ID)
    }
}
