pub mod cursor;
pub mod reading;

pub use cursor::Cursor;
pub use reading::{Reading, COMPENSATION_SECS, MIN_VALID_CELL_ID};

use serde::{Deserialize, Serialize};

/// Raw GPS fix as exported by the tracking device, before parsing
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawFix {
    pub time: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Descriptive survey metadata carried into exports
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyInfo {
    pub comment: String,
    pub device: String,
    pub model: String,
    pub os_version: String,
}
