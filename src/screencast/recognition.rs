use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SurveyError};
use crate::input::open_maybe_gz;

const CELL_PREFIX: &str = "lte_";
const CLOCK_PREFIX: &str = "tim_";

/// Output of the external recognizer for one screencast.
///
/// Frames are 1-based and dense up to `frame_count`; a frame missing from
/// `cells` was not recognized (near-duplicate of its predecessor).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionBatch {
    pub frame_count: usize,
    pub cells: BTreeMap<usize, Vec<String>>,
    pub clocks: BTreeMap<usize, String>,
}

impl RecognitionBatch {
    /// Load either a JSON batch file (`.json` / `.json.gz`) or a directory of
    /// recognizer text outputs.
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_json_file(path)
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let mut batch: RecognitionBatch =
            serde_json::from_reader(open_maybe_gz(path)?).map_err(|e| SurveyError::json(path, e))?;
        batch.frame_count = batch.frame_count.max(batch.highest_frame());
        Ok(batch)
    }

    /// Read `lte_NNNNNN.txt` token files and `tim_NNNNNN.txt` clock files.
    ///
    /// The frame count comes from the `lte_*.png` frames when they are still
    /// on disk, otherwise from the highest recognized frame index.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut batch = RecognitionBatch::default();
        let mut png_frames = 0usize;

        let entries = fs::read_dir(dir).map_err(|e| SurveyError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SurveyError::io(dir, e))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if let Some(idx) = frame_index(name, CELL_PREFIX, "png") {
                png_frames = png_frames.max(idx);
            } else if let Some(idx) = frame_index(name, CELL_PREFIX, "txt") {
                let text = fs::read_to_string(&path).map_err(|e| SurveyError::io(&path, e))?;
                batch.cells.insert(idx, split_words(&text));
            } else if let Some(idx) = frame_index(name, CLOCK_PREFIX, "txt") {
                let text = fs::read_to_string(&path).map_err(|e| SurveyError::io(&path, e))?;
                if let Some(first) = split_words(&text).into_iter().next() {
                    batch.clocks.insert(idx, first);
                }
            }
        }

        batch.frame_count = png_frames.max(batch.highest_frame());
        log::info!(
            "loaded recognition for {} of {} frames from {}",
            batch.cells.len(),
            batch.frame_count,
            dir.display()
        );
        Ok(batch)
    }

    /// Highest frame index carrying either overlay tokens or clock text
    fn highest_frame(&self) -> usize {
        let cell = self.cells.keys().next_back().copied().unwrap_or(0);
        let clock = self.clocks.keys().next_back().copied().unwrap_or(0);
        cell.max(clock)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }
}

/// Parse `prefix` + digits + `.ext` into a 1-based frame index
fn frame_index(name: &str, prefix: &str, ext: &str) -> Option<usize> {
    let stem = name.strip_prefix(prefix)?.strip_suffix(ext)?.strip_suffix('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok().filter(|&idx| idx > 0)
}

/// Whitespace-separated words of recognizer output, empties removed
pub fn split_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
