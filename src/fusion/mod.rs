// fusion — merged survey timeline
//
// Pairs the GPS and screencast streams second by second, then refines the
// result: thinning to cell changes and route shape, dropping excluded frame
// ranges, and shifting positions back by the recognizer lag exactly once.

pub mod clarify;
pub mod compensation;
pub mod exclusion;
pub mod merge;

pub use clarify::{cell_boundaries, clarify};
pub use compensation::compensate;
pub use exclusion::{apply_exclusions, is_excluded};
pub use merge::{merge_streams, MergeReport};

use crate::config::MergeConfig;
use crate::error::{Result, SurveyError};
use crate::screencast::Screencast;
use crate::track::Track;
use crate::types::Reading;

/// Fused rows of one survey, plus what has already been done to them
#[derive(Clone, Debug, Default)]
pub struct Fusion {
    pub survey_id: i64,
    rows: Vec<Reading>,
    pub merge_report: MergeReport,
    compensated: bool,
}

impl Fusion {
    pub fn merge(track: &Track, screencast: &Screencast, config: &MergeConfig) -> Result<Self> {
        let (rows, merge_report) = merge_streams(
            screencast.survey_id,
            &track.readings,
            track.cursor.as_ref(),
            &screencast.readings,
            screencast.cursor.as_ref(),
            config,
        )?;
        log::info!(
            "survey {}: merged {} rows (gps from {}, video from {})",
            screencast.survey_id,
            rows.len(),
            merge_report.gps_start,
            merge_report.video_start
        );
        Ok(Fusion {
            survey_id: screencast.survey_id,
            rows,
            merge_report,
            compensated: false,
        })
    }

    /// Thin the timeline; returns how many rows were dropped
    pub fn clarify(&mut self) -> usize {
        let before = self.rows.len();
        self.rows = clarify(&self.rows);
        before - self.rows.len()
    }

    /// Drop excluded frame ranges; returns how many rows were dropped
    pub fn apply_exclusions(&mut self, ranges: &[(u32, u32)]) -> usize {
        let before = self.rows.len();
        self.rows = apply_exclusions(std::mem::take(&mut self.rows), ranges);
        before - self.rows.len()
    }

    /// Apply the lag compensation. A second call is refused.
    pub fn apply_speed_compensation(&mut self) -> Result<()> {
        if self.compensated {
            return Err(SurveyError::AlreadyCompensated);
        }
        self.rows = compensate(&self.rows);
        self.compensated = true;
        Ok(())
    }

    pub fn is_compensated(&self) -> bool {
        self.compensated
    }

    pub fn valid_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_valid()).count()
    }

    pub fn rows(&self) -> &[Reading] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Reading> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
