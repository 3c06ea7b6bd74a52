use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// First usable position of a one-per-second stream.
///
/// Built once, after the producing stage has finished its pass, and only read
/// by the merge step to work out where the two streams start overlapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub first_valid_index: usize,
    pub first_valid_time: NaiveDateTime,
}

impl Cursor {
    pub fn new(first_valid_index: usize, first_valid_time: NaiveDateTime) -> Self {
        Self {
            first_valid_index,
            first_valid_time,
        }
    }

    /// Index of the first entry at or after `time`, walking forward from the cursor.
    /// Returns `len` when every entry is earlier or the cursor lies past the end.
    pub fn seek<F>(&self, len: usize, time: NaiveDateTime, time_at: F) -> usize
    where
        F: Fn(usize) -> Option<NaiveDateTime>,
    {
        let mut idx = self.first_valid_index.min(len);
        while idx < len && time_at(idx).map_or(true, |t| t < time) {
            idx += 1;
        }
        idx
    }
}
