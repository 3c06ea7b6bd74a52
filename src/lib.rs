//! Temporal alignment and fusion of LTE drive/walk surveys.
//!
//! A survey is a GPS track recorded alongside a screencast of a phone's
//! network diagnostics app. The GPS stream is resampled to one reading per
//! second, the screencast clock is reconstructed to second precision, and the
//! two are merged, simplified, filtered and lag-compensated into one sequence
//! of geo-located cellular readings.

pub mod config;
pub mod error;
pub mod export;
pub mod fusion;
pub mod input;
pub mod pipeline;
pub mod screencast;
pub mod track;
pub mod types;

pub use config::SurveyConfig;
pub use error::{Result, SurveyError};
pub use pipeline::{run, Stage, SurveyOutput, SurveyReport};
pub use types::Reading;
