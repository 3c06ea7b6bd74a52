// track.rs — GPS side of a survey
//
// Turns the irregular fixes of the tracking device into a gap-filled stream
// with exactly one reading per elapsed second, each carrying the geodesic
// motion towards its successor.

use std::io::BufRead;
use std::path::Path;

use chrono::TimeZone;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, SurveyError};
use crate::input::open_maybe_gz;
use crate::types::{Cursor, RawFix, Reading};

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Load raw fixes from a GPX track (`.gpx`, `.gpx.gz`) or a JSON array of
/// `{time, lat, lon}` objects (anything else, gzip accepted).
pub fn load_fixes(path: &Path) -> Result<Vec<RawFix>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".gpx") || name.ends_with(".gpx.gz") {
        return load_gpx(path);
    }
    serde_json::from_reader(open_maybe_gz(path)?).map_err(|e| SurveyError::json(path, e))
}

/// Every `trkpt` of a GPX document, in document order
pub fn load_gpx(path: &Path) -> Result<Vec<RawFix>> {
    let fixes = read_gpx(open_maybe_gz(path)?).map_err(|e| SurveyError::xml(path, e))?;
    log::info!("read {} track points from {}", fixes.len(), path.display());
    Ok(fixes)
}

fn read_gpx<R: BufRead>(source: R) -> std::result::Result<Vec<RawFix>, quick_xml::Error> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut fixes = Vec::new();
    let mut point: Option<RawFix> = None;
    let mut in_time = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"trkpt" => point = Some(trkpt_position(&e)?),
                b"time" => in_time = point.is_some(),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"trkpt" => {
                fixes.push(trkpt_position(&e)?);
            }
            Event::Text(t) if in_time => {
                if let Some(p) = point.as_mut() {
                    p.time = Some(t.unescape()?.into_owned());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"time" => in_time = false,
                b"trkpt" => fixes.extend(point.take()),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(fixes)
}

/// `lat` / `lon` attributes; unparsable values stay unset
fn trkpt_position(e: &BytesStart) -> std::result::Result<RawFix, quick_xml::Error> {
    let mut fix = RawFix::default();
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"lat" => fix.lat = value.trim().parse().ok(),
            b"lon" => fix.lon = value.trim().parse().ok(),
            _ => {}
        }
    }
    Ok(fix)
}

// ─── Resampling ──────────────────────────────────────────────────────────────

/// Resampled GPS stream of one survey
#[derive(Clone, Debug, Default)]
pub struct Track {
    pub survey_id: i64,
    pub readings: Vec<Reading>,
    pub cursor: Option<Cursor>,
    /// Usable fixes before resampling
    pub fix_count: usize,
}

impl Track {
    /// Build the one-per-second stream from raw fixes.
    ///
    /// Fewer than two usable fixes yield an empty track; the caller treats
    /// that as a missing GPS stream.
    pub fn from_fixes<Z: TimeZone>(survey_id: i64, fixes: &[RawFix], zone: &Z) -> Self {
        let observed = parse_fixes(survey_id, fixes, zone);
        let fix_count = observed.len();
        if fix_count < 2 {
            log::warn!(
                "survey {}: only {} usable GPS fix(es), track left empty",
                survey_id,
                fix_count
            );
            return Track {
                survey_id,
                fix_count,
                ..Default::default()
            };
        }

        let mut readings = extend_to_every_second(&observed);
        calculate_speed_and_direction(&mut readings);
        let cursor = readings[0].reading_time.map(|t| Cursor::new(0, t));

        log::info!(
            "survey {}: {} GPS fixes resampled to {} readings",
            survey_id,
            fix_count,
            readings.len()
        );

        Track {
            survey_id,
            readings,
            cursor,
            fix_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }
}

/// Parse fixes into readings, dropping unusable ones.
///
/// A fix needs a parsable time and finite coordinates, and its second must be
/// strictly later than the previous kept fix.
fn parse_fixes<Z: TimeZone>(survey_id: i64, fixes: &[RawFix], zone: &Z) -> Vec<Reading> {
    let mut out: Vec<Reading> = Vec::with_capacity(fixes.len());
    let mut dropped = 0usize;

    for (i, fix) in fixes.iter().enumerate() {
        let mut r = Reading::new(survey_id);
        r.file_idx = Some(i as u32 + 1);

        let timed = fix
            .time
            .as_deref()
            .map(|t| r.set_reading_time_from_str(t, zone))
            .unwrap_or(false);
        r.latitude = fix.lat.filter(|v| v.is_finite());
        r.longitude = fix.lon.filter(|v| v.is_finite());

        if !timed || !r.has_coordinates() {
            dropped += 1;
            continue;
        }

        let later = match (out.last().and_then(|p| p.reading_time), r.reading_time) {
            (Some(prev), Some(cur)) => cur > prev,
            _ => true,
        };
        if !later {
            dropped += 1;
            continue;
        }

        out.push(r);
    }

    if dropped > 0 {
        log::debug!("survey {}: dropped {} unusable GPS fixes", survey_id, dropped);
    }
    out
}

/// Insert interpolated readings so consecutive entries are exactly one second apart
fn extend_to_every_second(observed: &[Reading]) -> Vec<Reading> {
    let mut out = Vec::with_capacity(observed.len());

    for pair in observed.windows(2) {
        let (r1, r2) = (&pair[0], &pair[1]);
        out.push(r1.clone());

        let gap = match (r1.reading_time, r2.reading_time) {
            (Some(t1), Some(t2)) => (t2 - t1).num_seconds(),
            _ => 0,
        };
        for step in 1..gap {
            out.push(Reading::interpolated(r1, r2, step, gap));
        }
    }

    if let Some(last) = observed.last() {
        out.push(last.clone());
    }
    out
}

fn calculate_speed_and_direction(readings: &mut [Reading]) {
    for i in 1..readings.len() {
        let (head, tail) = readings.split_at_mut(i);
        head[i - 1].calculate_azimuth_and_speed(&tail[0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{FixedOffset, NaiveDate, NaiveDateTime};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn raw(time: &str, lat: f64, lon: f64) -> RawFix {
        RawFix {
            time: Some(time.to_string()),
            lat: Some(lat),
            lon: Some(lon),
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_three_second_gap_interpolation() {
        let fixes = vec![
            raw("2024-05-14T10:00:00Z", 46.20000, 6.15000),
            raw("2024-05-14T10:00:03Z", 46.20030, 6.15030),
        ];
        let track = Track::from_fixes(1, &fixes, &utc());

        assert_eq!(track.len(), 4);
        let times: Vec<_> = track.readings.iter().map(|r| r.reading_time.unwrap()).collect();
        assert_eq!(times, vec![at(10, 0, 0), at(10, 0, 1), at(10, 0, 2), at(10, 0, 3)]);

        let flags: Vec<bool> = track.readings.iter().map(|r| r.calculated).collect();
        assert_eq!(flags, vec![false, true, true, false]);

        assert_abs_diff_eq!(track.readings[1].latitude.unwrap(), 46.20010, epsilon = 1e-9);
        assert_abs_diff_eq!(track.readings[2].latitude.unwrap(), 46.20020, epsilon = 1e-9);
        assert_eq!(track.readings[1].file_idx, Some(1));
        assert_eq!(track.readings[2].file_idx, Some(1));
        assert_eq!(track.readings[3].file_idx, Some(2));
    }

    #[test]
    fn test_entry_count_matches_elapsed_seconds() {
        let fixes = vec![
            raw("2024-05-14T10:00:00Z", 46.2, 6.15),
            raw("2024-05-14T10:00:01Z", 46.2001, 6.15),
            raw("2024-05-14T10:00:07Z", 46.2004, 6.1502),
            raw("2024-05-14T10:00:08.900Z", 46.2005, 6.1503),
            raw("2024-05-14T10:01:02Z", 46.2010, 6.1510),
        ];
        let track = Track::from_fixes(1, &fixes, &utc());

        // 10:00:00 .. 10:01:02 inclusive
        assert_eq!(track.len(), 63);
        for pair in track.readings.windows(2) {
            let step = pair[1].reading_time.unwrap() - pair[0].reading_time.unwrap();
            assert_eq!(step.num_seconds(), 1);
        }
        assert!(!track.readings.first().unwrap().calculated);
        assert!(!track.readings.last().unwrap().calculated);
    }

    #[test]
    fn test_motion_on_all_but_last() {
        let fixes = vec![
            raw("2024-05-14T10:00:00Z", 46.2, 6.15),
            raw("2024-05-14T10:00:05Z", 46.2005, 6.15),
        ];
        let track = Track::from_fixes(1, &fixes, &utc());
        let (last, rest) = track.readings.split_last().unwrap();
        for r in rest {
            assert!(r.speed.is_some());
            assert!(r.forward_azimuth.is_some());
            assert!(r.backward_azimuth.is_some());
        }
        assert!(last.speed.is_none());
        // 0.0005 deg over 5 s ~ 11 m/s
        assert!((rest[0].speed.unwrap() - 11.1).abs() < 0.2);
    }

    #[test]
    fn test_unusable_fixes_dropped() {
        let fixes = vec![
            raw("2024-05-14T10:00:00Z", 46.2, 6.15),
            RawFix { time: None, lat: Some(46.3), lon: Some(6.2) },
            RawFix { time: Some("2024-05-14T10:00:01Z".into()), lat: None, lon: Some(6.2) },
            raw("not a time", 46.2, 6.15),
            raw("2024-05-14T10:00:00.500Z", 46.2, 6.15),
            raw("2024-05-14T10:00:02Z", 46.2002, 6.15),
        ];
        let track = Track::from_fixes(1, &fixes, &utc());
        assert_eq!(track.fix_count, 2);
        assert_eq!(track.len(), 3);
        assert_eq!(track.readings[2].file_idx, Some(6));
    }

    #[test]
    fn test_single_fix_yields_empty_track() {
        let fixes = vec![raw("2024-05-14T10:00:00Z", 46.2, 6.15)];
        let track = Track::from_fixes(1, &fixes, &utc());
        assert!(track.is_empty());
        assert!(track.cursor.is_none());
        assert_eq!(track.fix_count, 1);
    }

    #[test]
    fn test_cursor_at_first_reading() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let fixes = vec![
            raw("2024-05-14T08:15:19Z", 46.2, 6.15),
            raw("2024-05-14T08:15:21Z", 46.2002, 6.15),
        ];
        let track = Track::from_fixes(1, &fixes, &offset);
        let cursor = track.cursor.unwrap();
        assert_eq!(cursor.first_valid_index, 0);
        assert_eq!(cursor.first_valid_time, at(10, 15, 19));
    }

    #[test]
    fn test_load_fixes_from_json() {
        let path = std::env::temp_dir().join(format!("lte_survey_fixes_{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"time":"2024-05-14T10:00:00Z","lat":46.2,"lon":6.15},{"time":null,"lat":46.2}]"#,
        )
        .unwrap();
        let fixes = load_fixes(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(fixes.len(), 2);
        assert!(fixes[1].time.is_none());
        assert!(fixes[1].lon.is_none());
    }

    #[test]
    fn test_load_fixes_from_gpx() {
        let path = std::env::temp_dir().join(format!("lte_survey_track_{}.gpx", std::process::id()));
        std::fs::write(
            &path,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="tracker" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><time>2024-05-14T08:00:00Z</time></metadata>
  <trk><name>ring</name><trkseg>
    <trkpt lat="46.20000" lon="6.15000"><ele>372.0</ele><time>2024-05-14T08:15:19Z</time></trkpt>
    <trkpt lat="46.20030" lon="6.15030"><time>2024-05-14T08:15:22Z</time></trkpt>
    <trkpt lat="46.20060" lon="6.15060"/>
    <trkpt lat="north" lon="6.15090"><time>2024-05-14T08:15:30Z</time></trkpt>
  </trkseg></trk>
</gpx>"#,
        )
        .unwrap();
        let fixes = load_fixes(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(fixes.len(), 4);
        assert_eq!(fixes[0].time.as_deref(), Some("2024-05-14T08:15:19Z"));
        assert_eq!(fixes[0].lat, Some(46.2));
        assert_eq!(fixes[1].lon, Some(6.1503));
        assert!(fixes[2].time.is_none());
        assert!(fixes[3].lat.is_none());

        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let track = Track::from_fixes(1, &fixes, &offset);
        assert_eq!(track.fix_count, 2);
        assert_eq!(track.len(), 4);
        assert_eq!(track.readings[0].reading_time, Some(at(10, 15, 19)));
    }
}
