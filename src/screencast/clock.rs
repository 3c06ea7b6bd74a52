use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{AnchorProblem, Result, SurveyError};

/// Frames of one minute at one frame per second
const FRAMES_PER_MINUTE: usize = 60;

/// Decode recognized status-bar clock text (`HH:MM`, minute precision).
/// Everything but digits and `:` is OCR debris and is dropped first.
pub fn decode_clock(text: &str) -> Option<NaiveTime> {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit() || *c == ':').collect();
    NaiveTime::parse_from_str(&cleaned, "%H:%M").ok()
}

/// A minute change seen between two decoded frames
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Boundary {
    frame: usize,
    from: NaiveTime,
    to: NaiveTime,
}

/// Second-precision anchor derived from two minute-precision clock readings.
///
/// Frame numbers are 1-based screencast frame indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockAnchor {
    pub first_valid_frame: usize,
    pub first_valid_clock: NaiveTime,
    pub minute_change_frame: usize,
    pub second: u32,
}

impl ClockAnchor {
    /// Corrected absolute time of `first_valid_frame` on `date`
    pub fn start_time(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.first_valid_clock) + Duration::seconds(self.second as i64)
    }

    /// Corrected time of any frame at or after the anchor
    pub fn frame_time(&self, date: NaiveDate, frame: usize) -> Option<NaiveDateTime> {
        let offset = frame.checked_sub(self.first_valid_frame)?;
        Some(self.start_time(date) + Duration::seconds(offset as i64))
    }
}

/// Locate the clock anchor inside frames `1..=probe`.
///
/// The first decoded frame gives the minute, the first later frame showing a
/// different minute gives the boundary, and the second at the first frame is
/// `60 - (boundary - first)`. With `strict`, every boundary in the window must
/// advance exactly one minute and sit exactly 60 frames after the previous
/// one; otherwise the anchor is rejected. Without `strict`, inconsistent later
/// boundaries are only logged and the first is used.
pub fn find_anchor(
    clocks: &BTreeMap<usize, String>,
    probe: usize,
    strict: bool,
) -> Result<ClockAnchor> {
    if probe == 0 {
        return Err(SurveyError::AmbiguousClockAnchor(AnchorProblem::NoClockReading));
    }
    let decoded: Vec<(usize, NaiveTime)> = clocks
        .range(1..=probe)
        .filter_map(|(&frame, text)| decode_clock(text).map(|t| (frame, t)))
        .collect();

    let Some(&(first_frame, first_clock)) = decoded.first() else {
        return Err(SurveyError::AmbiguousClockAnchor(AnchorProblem::NoClockReading));
    };

    let mut boundaries = Vec::new();
    let mut prev = first_clock;
    for &(frame, clock) in &decoded[1..] {
        if clock != prev {
            boundaries.push(Boundary { frame, from: prev, to: clock });
            prev = clock;
        }
    }

    let Some(first_boundary) = boundaries.first().copied() else {
        return Err(SurveyError::AmbiguousClockAnchor(AnchorProblem::NoMinuteBoundary {
            first_valid_index: first_frame,
        }));
    };

    let lead = first_boundary.frame - first_frame;
    if lead > FRAMES_PER_MINUTE {
        return Err(SurveyError::AmbiguousClockAnchor(AnchorProblem::BoundaryTooFar {
            first_valid_index: first_frame,
            minute_change_index: first_boundary.frame,
        }));
    }

    let consistent = boundaries.iter().all(|b| b.to == b.from + Duration::minutes(1))
        && boundaries
            .windows(2)
            .all(|w| w[1].frame - w[0].frame == FRAMES_PER_MINUTE);

    if !consistent {
        let problem = AnchorProblem::InconsistentBoundaries {
            first_valid_index: first_frame,
            boundaries: boundaries.iter().map(|b| b.frame).collect(),
        };
        if strict {
            return Err(SurveyError::AmbiguousClockAnchor(problem));
        }
        log::warn!("clock anchor: {}; using first boundary", problem);
    }

    let anchor = ClockAnchor {
        first_valid_frame: first_frame,
        first_valid_clock: first_clock,
        minute_change_frame: first_boundary.frame,
        second: (FRAMES_PER_MINUTE - lead) as u32,
    };
    log::info!(
        "clock anchor: frame {} reads {}, minute changes at frame {}, second {}",
        anchor.first_valid_frame,
        anchor.first_valid_clock.format("%H:%M"),
        anchor.minute_change_frame,
        anchor.second
    );
    Ok(anchor)
}
