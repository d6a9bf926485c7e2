//! Normalized 0-10 display score derived from the intensity level.
//!
//! Never stored: always computed from the level at read time.

use crate::intensity::clamp_level;

/// `round(level) / 10`, one decimal place, in [0.0, 10.0]
pub fn score(level: f64) -> f64 {
    clamp_level(level).round() / 10.0
}
