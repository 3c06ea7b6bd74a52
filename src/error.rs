use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Which input stream of a survey an error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Gps,
    Recognition,
    Clock,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Gps => write!(f, "GPS fixes"),
            StreamKind::Recognition => write!(f, "frame recognition batch"),
            StreamKind::Clock => write!(f, "screencast clock"),
        }
    }
}

/// Why the clock probe window did not yield a single trustworthy anchor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnchorProblem {
    NoClockReading,
    NoMinuteBoundary { first_valid_index: usize },
    InconsistentBoundaries { first_valid_index: usize, boundaries: Vec<usize> },
    BoundaryTooFar { first_valid_index: usize, minute_change_index: usize },
    PastLastFrame { first_valid_index: usize, frame_count: usize },
}

impl fmt::Display for AnchorProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorProblem::NoClockReading => write!(f, "no readable clock in the probe window"),
            AnchorProblem::NoMinuteBoundary { first_valid_index } => write!(
                f,
                "no minute boundary after frame {} in the probe window",
                first_valid_index
            ),
            AnchorProblem::InconsistentBoundaries { first_valid_index, boundaries } => write!(
                f,
                "minute boundaries {:?} after frame {} are not one minute apart",
                boundaries, first_valid_index
            ),
            AnchorProblem::BoundaryTooFar { first_valid_index, minute_change_index } => write!(
                f,
                "minute changes at frame {} which is more than 60 frames after frame {}",
                minute_change_index, first_valid_index
            ),
            AnchorProblem::PastLastFrame { first_valid_index, frame_count } => write!(
                f,
                "first readable clock at frame {} but the screencast has only {} frames",
                first_valid_index, frame_count
            ),
        }
    }
}

/// Survey processing error types
#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("Missing stream: {0} is absent or empty")]
    MissingStream(StreamKind),

    #[error("Ambiguous clock anchor: {0}")]
    AmbiguousClockAnchor(AnchorProblem),

    #[error("Streams diverge at file_idx {file_idx:?}: gps {gps_time} vs video {video_time}")]
    StreamDivergence {
        file_idx: Option<u32>,
        gps_time: NaiveDateTime,
        video_time: NaiveDateTime,
    },

    #[error("Speed compensation already applied to this timeline")]
    AlreadyCompensated,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("GPX error on {}: {source}", .path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },
}

impl SurveyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SurveyError::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        SurveyError::Json { path: path.into(), source }
    }

    pub(crate) fn xml(path: impl Into<PathBuf>, source: quick_xml::Error) -> Self {
        SurveyError::Xml { path: path.into(), source }
    }
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, SurveyError>;
