use serde::{Deserialize, Serialize};

use crate::config::MergeConfig;
use crate::error::{Result, SurveyError};
use crate::types::{Cursor, Reading};

/// Where the two streams started overlapping and how well they stayed paired
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub gps_start: usize,
    pub video_start: usize,
    pub merged: usize,
    /// Pairs whose timestamps differ by more than one second
    pub divergences: usize,
}

/// One record per paired step: cellular attributes, time and frame index
/// from the video, position and motion from the GPS.
fn fuse(survey_id: i64, video: &Reading, gps: &Reading) -> Reading {
    let mut row = gps.clone();
    row.survey_id = survey_id;
    row.file_idx = video.file_idx;
    row.reading_time = video.reading_time;
    row.copy_cellular_from(video);
    row
}

/// Align both one-per-second streams on their start times, then pair them
/// by position until either runs out.
///
/// A missing cursor or empty stream merges to nothing. The later of the two
/// start times wins: the other stream is advanced to the first entry at or
/// after it.
pub fn merge_streams(
    survey_id: i64,
    gps: &[Reading],
    gps_cursor: Option<&Cursor>,
    video: &[Reading],
    video_cursor: Option<&Cursor>,
    config: &MergeConfig,
) -> Result<(Vec<Reading>, MergeReport)> {
    let mut report = MergeReport::default();
    let (Some(gps_cursor), Some(video_cursor)) = (gps_cursor, video_cursor) else {
        return Ok((Vec::new(), report));
    };
    if gps.is_empty() || video.is_empty() {
        return Ok((Vec::new(), report));
    }

    let mut gps_start = gps_cursor.first_valid_index.min(gps.len());
    let mut video_start = video_cursor.first_valid_index.min(video.len());

    if gps_cursor.first_valid_time > video_cursor.first_valid_time {
        // positioning started after filming
        video_start = video_cursor.seek(video.len(), gps_cursor.first_valid_time, |i| {
            video[i].reading_time
        });
    } else {
        gps_start = gps_cursor.seek(gps.len(), video_cursor.first_valid_time, |i| {
            gps[i].reading_time
        });
    }
    report.gps_start = gps_start;
    report.video_start = video_start;

    let video_remaining = video.len().saturating_sub(video_start);
    let pairs = video.iter().skip(video_start).zip(gps.iter().skip(gps_start));
    let mut rows = Vec::with_capacity(video_remaining);

    for (v, g) in pairs {
        if let (Some(vt), Some(gt)) = (v.reading_time, g.reading_time) {
            let drift = (vt - gt).num_seconds().abs();
            if drift > 1 {
                if report.divergences == 0 {
                    log::warn!(
                        "streams drift {} s apart from file_idx {:?} on (gps {}, video {})",
                        drift,
                        v.file_idx,
                        gt,
                        vt
                    );
                }
                report.divergences += 1;
            }
            if let Some(limit) = config.max_divergence_secs {
                if drift > limit {
                    return Err(SurveyError::StreamDivergence {
                        file_idx: v.file_idx,
                        gps_time: gt,
                        video_time: vt,
                    });
                }
            }
        }
        rows.push(fuse(survey_id, v, g));
    }

    report.merged = rows.len();
    if rows.len() < video_remaining {
        log::info!(
            "GPS track ended {} frames before the screencast",
            video_remaining - rows.len()
        );
    }
    Ok((rows, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn gps_stream(start: NaiveDateTime, len: usize) -> Vec<Reading> {
        (0..len)
            .map(|i| Reading {
                latitude: Some(46.2 + i as f64 * 1e-5),
                longitude: Some(6.15),
                speed: Some(1.1),
                forward_azimuth: Some(0.0),
                backward_azimuth: Some(180.0),
                reading_time: Some(start + Duration::seconds(i as i64)),
                calculated: i % 2 == 1,
                ..Reading::new(1)
            })
            .collect()
    }

    fn video_stream(start: NaiveDateTime, len: usize) -> Vec<Reading> {
        (0..len)
            .map(|i| Reading {
                file_idx: Some(i as u32 + 1),
                cell_id: Some(17_063_938),
                band: Some(3),
                reading_time: Some(start + Duration::seconds(i as i64)),
                ..Reading::new(1)
            })
            .collect()
    }

    fn cursor_of(stream: &[Reading]) -> Cursor {
        Cursor::new(0, stream[0].reading_time.unwrap())
    }

    #[test]
    fn test_gps_later_skips_video_frames() {
        let gps = gps_stream(at(10, 15, 19), 100);
        let video = video_stream(at(10, 15, 0), 60);
        let (rows, report) = merge_streams(
            1,
            &gps,
            Some(&cursor_of(&gps)),
            &video,
            Some(&cursor_of(&video)),
            &MergeConfig::default(),
        )
        .unwrap();

        assert_eq!(report.video_start, 19);
        assert_eq!(report.gps_start, 0);
        assert_eq!(rows.len(), 41);
        assert_eq!(rows[0].file_idx, Some(20));
        assert_eq!(rows[0].reading_time, Some(at(10, 15, 19)));
        assert_eq!(rows[0].latitude, gps[0].latitude);
        assert_eq!(report.divergences, 0);
    }

    #[test]
    fn test_video_later_skips_gps_readings() {
        let gps = gps_stream(at(10, 14, 0), 200);
        let video = video_stream(at(10, 15, 19), 30);
        let (rows, report) = merge_streams(
            1,
            &gps,
            Some(&cursor_of(&gps)),
            &video,
            Some(&cursor_of(&video)),
            &MergeConfig::default(),
        )
        .unwrap();

        assert_eq!(report.gps_start, 79);
        assert_eq!(rows.len(), 30);
        assert_eq!(rows[0].latitude, gps[79].latitude);
        assert_eq!(rows[1].calculated, gps[80].calculated);
        assert_eq!(rows[0].cell_id, Some(17_063_938));
        assert_eq!(rows[0].speed, Some(1.1));
    }

    #[test]
    fn test_short_gps_truncates() {
        let gps = gps_stream(at(10, 15, 0), 10);
        let video = video_stream(at(10, 15, 0), 30);
        let (rows, _) = merge_streams(
            1,
            &gps,
            Some(&cursor_of(&gps)),
            &video,
            Some(&cursor_of(&video)),
            &MergeConfig::default(),
        )
        .unwrap();
        assert_eq!(rows.len(), 10);
    }

    #[test]
    fn test_video_cursor_offset_respected() {
        let gps = gps_stream(at(10, 15, 0), 50);
        let mut video = video_stream(at(10, 14, 57), 30);
        for r in video.iter_mut().take(3) {
            r.reading_time = None;
        }
        let video_cursor = Cursor::new(3, at(10, 15, 0));
        let (rows, report) = merge_streams(
            1,
            &gps,
            Some(&cursor_of(&gps)),
            &video,
            Some(&video_cursor),
            &MergeConfig::default(),
        )
        .unwrap();
        assert_eq!(report.video_start, 3);
        assert_eq!(rows[0].file_idx, Some(4));
        assert_eq!(rows.len(), 27);
    }

    #[test]
    fn test_empty_stream_merges_to_nothing() {
        let video = video_stream(at(10, 15, 0), 30);
        let (rows, report) = merge_streams(
            1,
            &[],
            None,
            &video,
            Some(&cursor_of(&video)),
            &MergeConfig::default(),
        )
        .unwrap();
        assert!(rows.is_empty());
        assert_eq!(report.merged, 0);
    }

    #[test]
    fn test_divergence_counted_and_enforced() {
        let gps = gps_stream(at(10, 15, 0), 30);
        let mut video = video_stream(at(10, 15, 0), 30);
        // a dropped frame: everything after 10 is two seconds ahead
        for (i, r) in video.iter_mut().enumerate().skip(10) {
            r.reading_time = Some(at(10, 15, 0) + Duration::seconds(i as i64 + 2));
        }

        let (_, report) = merge_streams(
            1,
            &gps,
            Some(&cursor_of(&gps)),
            &video,
            Some(&cursor_of(&video)),
            &MergeConfig::default(),
        )
        .unwrap();
        assert_eq!(report.divergences, 20);

        let strict = MergeConfig {
            max_divergence_secs: Some(1),
        };
        let err = merge_streams(
            1,
            &gps,
            Some(&cursor_of(&gps)),
            &video,
            Some(&cursor_of(&video)),
            &strict,
        )
        .unwrap_err();
        assert!(matches!(err, SurveyError::StreamDivergence { file_idx: Some(11), .. }));
    }

    #[test]
    fn test_video_cursor_past_stream_merges_to_nothing() {
        let gps = gps_stream(at(10, 14, 0), 200);
        let video = video_stream(at(10, 15, 0), 3);
        let beyond = Cursor::new(4, at(10, 15, 4));
        let (rows, report) = merge_streams(
            1,
            &gps,
            Some(&cursor_of(&gps)),
            &video,
            Some(&beyond),
            &MergeConfig::default(),
        )
        .unwrap();
        assert!(rows.is_empty());
        assert_eq!(report.merged, 0);
        assert_eq!(report.video_start, 3);

        // GPS starting later makes the video side seek from the out-of-range cursor
        let late_gps = gps_stream(at(10, 20, 0), 10);
        let (rows, report) = merge_streams(
            1,
            &late_gps,
            Some(&cursor_of(&late_gps)),
            &video,
            Some(&beyond),
            &MergeConfig::default(),
        )
        .unwrap();
        assert!(rows.is_empty());
        assert_eq!(report.video_start, 3);
    }
}
