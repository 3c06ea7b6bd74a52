// screencast — video side of a survey
//
// Builds one reading per 1 Hz screencast frame from the recognizer output:
// cellular attributes from the diagnostics overlay (held over across frames
// the recognizer skipped or could not read), and an absolute second-precision
// clock reconstructed from the minute-precision status bar.

pub mod clock;
pub mod overlay;
pub mod recognition;

pub use clock::{decode_clock, find_anchor, ClockAnchor};
pub use overlay::{parse_overlay, OverlayValues, RecognitionGap};
pub use recognition::RecognitionBatch;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ClockConfig;
use crate::error::{AnchorProblem, Result, StreamKind, SurveyError};
use crate::types::{Cursor, Reading};

/// Per-run counters of the reconstruction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreencastStats {
    pub frames: usize,
    /// Frames whose own text decoded
    pub recognized: usize,
    /// Frames whose text was present but discarded
    pub rejected: usize,
    /// Frames the recognizer skipped
    pub skipped: usize,
    /// Frames before any successful decode, left without attributes
    pub unpopulated: usize,
}

/// Last successfully decoded overlay, copied into frames that have none of their own
#[derive(Clone, Debug, Default)]
struct HoldOver {
    last: Option<OverlayValues>,
}

impl HoldOver {
    fn remember(&mut self, values: &OverlayValues) {
        self.last = Some(values.clone());
    }

    /// Fill `reading` from the snapshot; false when nothing decoded yet
    fn fill(&self, reading: &mut Reading) -> bool {
        match &self.last {
            Some(values) => {
                apply_overlay(values, reading);
                true
            }
            None => false,
        }
    }
}

fn apply_overlay(values: &OverlayValues, reading: &mut Reading) {
    reading.tracking_area_code = values.tracking_area_code;
    reading.band = values.band;
    reading.cell_id = values.cell_id;
    reading.physical_cell_id = values.physical_cell_id;
}

/// Video-derived stream of one survey
#[derive(Clone, Debug, Default)]
pub struct Screencast {
    pub survey_id: i64,
    pub readings: Vec<Reading>,
    pub cursor: Option<Cursor>,
    pub anchor: Option<ClockAnchor>,
    pub stats: ScreencastStats,
}

impl Screencast {
    /// Rebuild the per-frame stream.
    ///
    /// `date` is combined with the recognized `HH:MM` clock. Frames before the
    /// clock anchor keep `reading_time = None`; from the anchor on every frame
    /// is exactly one second after its predecessor.
    pub fn reconstruct(
        survey_id: i64,
        batch: &RecognitionBatch,
        date: NaiveDate,
        clock: &ClockConfig,
    ) -> Result<Self> {
        if batch.is_empty() {
            return Err(SurveyError::MissingStream(StreamKind::Recognition));
        }
        if batch.clocks.is_empty() {
            return Err(SurveyError::MissingStream(StreamKind::Clock));
        }

        let mut screencast = Screencast {
            survey_id,
            readings: Vec::with_capacity(batch.frame_count),
            ..Default::default()
        };
        screencast.read_frames(batch);

        let anchor = find_anchor(&batch.clocks, clock.time_scan_probe, clock.strict_anchor)?;
        if anchor.first_valid_frame > screencast.readings.len() {
            return Err(SurveyError::AmbiguousClockAnchor(AnchorProblem::PastLastFrame {
                first_valid_index: anchor.first_valid_frame,
                frame_count: screencast.readings.len(),
            }));
        }
        screencast.set_precise_time(&anchor, date);

        log::info!(
            "survey {}: {} frames, {} recognized, {} rejected, {} held over, video starts {}",
            survey_id,
            screencast.stats.frames,
            screencast.stats.recognized,
            screencast.stats.rejected,
            screencast.stats.skipped,
            anchor.start_time(date)
        );
        Ok(screencast)
    }

    fn read_frames(&mut self, batch: &RecognitionBatch) {
        let mut hold = HoldOver::default();

        for frame in 1..=batch.frame_count {
            let mut r = Reading::new(self.survey_id);
            r.file_idx = Some(frame as u32);
            self.stats.frames += 1;

            let decoded = match batch.cells.get(&frame) {
                Some(tokens) => match parse_overlay(tokens) {
                    Ok(values) => Some(values),
                    Err(gap) => {
                        log::warn!("frame {}: recognition gap, {}", frame, gap);
                        self.stats.rejected += 1;
                        None
                    }
                },
                None => {
                    self.stats.skipped += 1;
                    None
                }
            };

            match decoded {
                Some(values) => {
                    apply_overlay(&values, &mut r);
                    hold.remember(&values);
                    self.stats.recognized += 1;
                }
                None => {
                    if !hold.fill(&mut r) {
                        self.stats.unpopulated += 1;
                    }
                }
            }

            self.readings.push(r);
        }
    }

    fn set_precise_time(&mut self, anchor: &ClockAnchor, date: NaiveDate) {
        for r in self.readings.iter_mut().skip(anchor.first_valid_frame - 1) {
            r.reading_time = r
                .file_idx
                .and_then(|frame| anchor.frame_time(date, frame as usize));
        }
        self.cursor = Some(Cursor::new(
            anchor.first_valid_frame - 1,
            anchor.start_time(date),
        ));
        self.anchor = Some(*anchor);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
