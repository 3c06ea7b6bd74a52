use std::fs;
use std::path::Path;

use chrono::{FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SurveyError};
use crate::types::SurveyInfo;

// ─── Clock reconstruction ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Frames at the start of the screencast whose clock text is consulted
    pub time_scan_probe: usize,
    /// Reject the anchor when the probe window shows inconsistent minute changes
    pub strict_anchor: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            time_scan_probe: 90,
            strict_anchor: true,
        }
    }
}

// ─── Stream merge ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Fail the merge when paired timestamps drift further apart than this
    pub max_divergence_secs: Option<i64>,
}

// ─── Survey ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub survey_id: i64,
    pub network_id: i64,
    pub survey: SurveyInfo,

    /// Inclusive `file_idx` ranges to drop from the final sequence
    pub exclusions: Vec<(u32, u32)>,

    /// Zone whose wall clock the screencast shows; GPS UTC times are converted into it
    pub timezone: Tz,
    /// Fixed offset from UTC in minutes, overriding `timezone` when set
    pub utc_offset_minutes: Option<i32>,
    /// Date shown by the screencast clock; defaults to the first GPS fix's date
    pub survey_date: Option<NaiveDate>,

    pub clock: ClockConfig,
    pub merge: MergeConfig,

    /// Below this many valid rows the survey is flagged
    pub min_valid_records: usize,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            survey_id: 0,
            network_id: 0,
            survey: SurveyInfo::default(),
            exclusions: Vec::new(),
            timezone: chrono_tz::Europe::Zurich,
            utc_offset_minutes: None,
            survey_date: None,
            clock: ClockConfig::default(),
            merge: MergeConfig::default(),
            min_valid_records: 10,
        }
    }
}

impl SurveyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| SurveyError::io(path, e))?;
        let config: SurveyConfig =
            serde_json::from_str(&contents).map_err(|e| SurveyError::json(path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((lo, hi)) = self.exclusions.iter().find(|(lo, hi)| lo > hi) {
            return Err(SurveyError::Config(format!(
                "exclusion range [{}, {}] is reversed",
                lo, hi
            )));
        }
        if self.clock.time_scan_probe == 0 {
            return Err(SurveyError::Config("clock.time_scan_probe must be positive".into()));
        }
        self.utc_offset()?;
        Ok(())
    }

    /// The explicit fixed-offset override, if configured
    pub fn utc_offset(&self) -> Result<Option<FixedOffset>> {
        let Some(minutes) = self.utc_offset_minutes else {
            return Ok(None);
        };
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Some)
            .ok_or_else(|| SurveyError::Config(format!("utc_offset_minutes {} out of range", minutes)))
    }
}
