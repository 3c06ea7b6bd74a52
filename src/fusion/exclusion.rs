use crate::types::Reading;

/// True when `file_idx` falls inside any of the inclusive `ranges`.
/// Readings without a frame index are never excluded.
pub fn is_excluded(file_idx: Option<u32>, ranges: &[(u32, u32)]) -> bool {
    let Some(idx) = file_idx else {
        return false;
    };
    ranges.iter().any(|&(lo, hi)| lo <= idx && idx <= hi)
}

/// Drop every reading whose `file_idx` lies in one of the inclusive ranges
pub fn apply_exclusions(rows: Vec<Reading>, ranges: &[(u32, u32)]) -> Vec<Reading> {
    if ranges.is_empty() {
        return rows;
    }
    let before = rows.len();
    let kept: Vec<Reading> = rows
        .into_iter()
        .filter(|r| !is_excluded(r.file_idx, ranges))
        .collect();
    log::info!(
        "exclusions: {} range(s) removed {} of {} rows",
        ranges.len(),
        before - kept.len(),
        before
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: u32) -> Vec<Reading> {
        (1..=n)
            .map(|i| Reading {
                file_idx: Some(i),
                ..Reading::new(1)
            })
            .collect()
    }

    fn indices(rows: &[Reading]) -> Vec<u32> {
        rows.iter().filter_map(|r| r.file_idx).collect()
    }

    #[test]
    fn test_inclusive_range_removed() {
        let out = apply_exclusions(rows(30), &[(10, 20)]);
        let idx = indices(&out);
        assert_eq!(idx.len(), 19);
        assert_eq!(&idx[..9], &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(&idx[9..], &[21, 22, 23, 24, 25, 26, 27, 28, 29, 30]);
    }

    #[test]
    fn test_several_ranges_and_single_frame() {
        let out = apply_exclusions(rows(10), &[(2, 3), (7, 7)]);
        assert_eq!(indices(&out), vec![1, 4, 5, 6, 8, 9, 10]);
    }

    #[test]
    fn test_idempotent() {
        let ranges = [(5, 8), (12, 20)];
        let once = apply_exclusions(rows(25), &ranges);
        let twice = apply_exclusions(once.clone(), &ranges);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_ranges_keeps_everything() {
        assert_eq!(apply_exclusions(rows(5), &[]).len(), 5);
    }

    #[test]
    fn test_missing_file_idx_never_excluded() {
        assert!(!is_excluded(None, &[(0, u32::MAX)]));
        assert!(is_excluded(Some(0), &[(0, 0)]));
    }
}
