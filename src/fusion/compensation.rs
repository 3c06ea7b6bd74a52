use crate::types::Reading;

/// Shift every reading back along its backward azimuth by the distance covered
/// during the recognizer's lag. Readings without speed or heading pass through.
pub fn compensate(rows: &[Reading]) -> Vec<Reading> {
    let out: Vec<Reading> = rows.iter().map(Reading::compensated).collect();
    let moved = rows.iter().zip(&out).filter(|(a, b)| a != b).count();
    log::info!("speed compensation moved {} of {} rows", moved, rows.len());
    out
}
