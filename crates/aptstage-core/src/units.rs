//! Unit Conversion Functions
//!
//! The controller works in encoder counts. These convert to and from the
//! stage's angular units using the scale factors of the rotation stage.

/// Encoder counts per degree of stage rotation
pub const COUNTS_PER_DEGREE: f64 = 1638.0;

/// Controller velocity units per degree/second
pub const VELOCITY_SCALE: f64 = 36650.0;

/// Controller acceleration units per degree/second²
pub const ACCELERATION_SCALE: f64 = 95.276;

/// Convert an encoder count to degrees
pub fn degrees(counts: i32) -> f64 {
    counts as f64 / COUNTS_PER_DEGREE
}

/// Convert degrees to an encoder count, truncating toward zero
pub fn counts(degrees: f64) -> i32 {
    (degrees * COUNTS_PER_DEGREE) as i32
}

/// Convert degrees/second to controller velocity units
pub fn velocity_counts(degrees_per_second: f64) -> u32 {
    (degrees_per_second * VELOCITY_SCALE) as u32
}

/// Convert degrees/second² to controller acceleration units
pub fn acceleration_counts(degrees_per_second_sq: f64) -> u32 {
    (degrees_per_second_sq * ACCELERATION_SCALE) as u32
}
