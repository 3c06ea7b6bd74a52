use crate::types::Reading;

/// Base spacing between kept readings inside one cell, meters
const MIN_SPACING_M: f64 = 50.0;
/// Extra spacing per m/s of speed, meters
const SPACING_PER_SPEED_M: f64 = 10.0;
/// Heading change that counts as a genuine turn, degrees
const TURN_ANGLE_DEG: f64 = 45.0;
/// Below this speed heading changes are treated as GPS zig-zag, m/s
const TURN_MIN_SPEED: f64 = 3.0;

/// Whether `candidate` is far enough from the last kept reading to keep as well.
///
/// The required distance grows with speed; at more than walking pace a turn of
/// over 45° is kept regardless of distance. No speed means never.
fn is_far_enough(kept: &Reading, candidate: &Reading) -> bool {
    let Some(speed) = kept.speed.filter(|s| *s != 0.0) else {
        return false;
    };
    let Some(dist) = kept.distance_to(candidate) else {
        return false;
    };

    let min_dist = MIN_SPACING_M + speed * SPACING_PER_SPEED_M;
    let turned = kept
        .turn_angle(candidate)
        .map_or(false, |alpha| alpha > TURN_ANGLE_DEG && speed > TURN_MIN_SPEED);

    dist > min_dist || turned
}

/// Positions within `rows` that open a new cell, plus the first and last row
pub fn cell_boundaries(rows: &[&Reading]) -> Vec<usize> {
    if rows.is_empty() {
        return Vec::new();
    }

    let mut keep = vec![0];
    for (i, reading) in rows.iter().enumerate().skip(1) {
        if reading.cell_id != rows[keep[keep.len() - 1]].cell_id {
            keep.push(i);
        }
    }
    if keep[keep.len() - 1] != rows.len() - 1 {
        keep.push(rows.len() - 1);
    }
    keep
}

/// Thin the valid readings down to cell changes plus enough points in
/// between to trace the route.
pub fn clarify(rows: &[Reading]) -> Vec<Reading> {
    let valid: Vec<&Reading> = rows.iter().filter(|r| r.is_valid()).collect();
    let keep = cell_boundaries(&valid);

    let mut out = Vec::with_capacity(keep.len());
    for (i, &k) in keep.iter().enumerate() {
        let mut anchor = valid[k];
        out.push(anchor.clone());

        let next_k = keep.get(i + 1).copied().unwrap_or(k);
        for candidate in valid.iter().take(next_k).skip(k + 1) {
            if is_far_enough(anchor, candidate) {
                out.push((*candidate).clone());
                anchor = *candidate;
            }
        }
    }

    log::info!(
        "clarify: {} rows, {} valid, {} kept ({} cell boundaries)",
        rows.len(),
        valid.len(),
        out.len(),
        keep.len()
    );
    out
}
