// pipeline.rs — one survey, end to end
//
// Strictly staged: every stage consumes the whole output of the previous one.
// Stream-level absence aborts the run with an error; a stage that merely ends
// up with zero rows is reported so the caller can name it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SurveyConfig;
use crate::error::{Result, StreamKind, SurveyError};
use crate::fusion::{Fusion, MergeReport};
use crate::screencast::{RecognitionBatch, Screencast, ScreencastStats};
use crate::track::Track;
use crate::types::{RawFix, Reading};

// ─── Stages ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Track,
    Screencast,
    Merge,
    Clarify,
    Exclusions,
    Compensation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Track => "GPS resampling",
            Stage::Screencast => "frame clock reconstruction",
            Stage::Merge => "stream merge",
            Stage::Clarify => "simplification",
            Stage::Exclusions => "exclusion filtering",
            Stage::Compensation => "speed compensation",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: Stage,
    pub rows: usize,
    /// Rows with a plausible cell identifier
    pub valid: usize,
}

impl StageCount {
    /// GPS rows never carry cell attributes, so that stage is judged by rows alone
    pub fn is_empty(&self) -> bool {
        match self.stage {
            Stage::Track => self.rows == 0,
            _ => self.valid == 0,
        }
    }
}

fn count(stage: Stage, rows: &[Reading]) -> StageCount {
    StageCount {
        stage,
        rows: rows.len(),
        valid: rows.iter().filter(|r| r.is_valid()).count(),
    }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyReport {
    pub survey_id: i64,
    pub gps_fixes: usize,
    pub screencast: ScreencastStats,
    pub merge: MergeReport,
    pub stages: Vec<StageCount>,
    pub compensation_passes: u32,
    /// Fewer valid rows than `min_valid_records` survived
    pub low_valid_records: bool,
}

impl SurveyReport {
    /// First stage that produced no usable row, if any
    pub fn first_empty_stage(&self) -> Option<Stage> {
        self.stages.iter().find(|s| s.is_empty()).map(|s| s.stage)
    }

    pub fn final_rows(&self) -> usize {
        self.stages.last().map_or(0, |s| s.rows)
    }

    fn record(&mut self, stage: Stage, rows: &[Reading]) {
        let c = count(stage, rows);
        log::info!("survey {}: {} -> {} rows ({} valid)", self.survey_id, stage, c.rows, c.valid);
        self.stages.push(c);
    }
}

#[derive(Clone, Debug, Default)]
pub struct SurveyOutput {
    pub report: SurveyReport,
    pub rows: Vec<Reading>,
}

// ─── Run ─────────────────────────────────────────────────────────────────────

/// Process one survey: resample the GPS fixes, rebuild the screencast clock,
/// merge, simplify, drop excluded frames and compensate once.
pub fn run(config: &SurveyConfig, fixes: &[RawFix], batch: &RecognitionBatch) -> Result<SurveyOutput> {
    config.validate()?;
    let mut report = SurveyReport {
        survey_id: config.survey_id,
        ..Default::default()
    };

    let track = match config.utc_offset()? {
        Some(offset) => Track::from_fixes(config.survey_id, fixes, &offset),
        None => Track::from_fixes(config.survey_id, fixes, &config.timezone),
    };
    report.gps_fixes = track.fix_count;
    if track.is_empty() {
        return Err(SurveyError::MissingStream(StreamKind::Gps));
    }
    report.record(Stage::Track, &track.readings);

    let date = match config.survey_date {
        Some(date) => date,
        None => track
            .readings
            .first()
            .and_then(|r| r.reading_time)
            .map(|t| t.date())
            .ok_or(SurveyError::MissingStream(StreamKind::Gps))?,
    };

    let screencast = Screencast::reconstruct(config.survey_id, batch, date, &config.clock)?;
    report.screencast = screencast.stats.clone();
    report.record(Stage::Screencast, &screencast.readings);

    let mut fusion = Fusion::merge(&track, &screencast, &config.merge)?;
    report.merge = fusion.merge_report.clone();
    report.record(Stage::Merge, fusion.rows());

    fusion.clarify();
    report.record(Stage::Clarify, fusion.rows());

    fusion.apply_exclusions(&config.exclusions);
    report.record(Stage::Exclusions, fusion.rows());

    fusion.apply_speed_compensation()?;
    report.compensation_passes += 1;
    report.record(Stage::Compensation, fusion.rows());

    let valid = fusion.valid_count();
    if valid < config.min_valid_records {
        report.low_valid_records = true;
        log::warn!(
            "survey {}: only {} valid rows (minimum {})",
            config.survey_id,
            valid,
            config.min_valid_records
        );
    }

    Ok(SurveyOutput {
        report,
        rows: fusion.into_rows(),
    })
}
