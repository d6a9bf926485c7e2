//! Intensity state and merge policy
//!
//! `IntensityState` holds the single authoritative excitement level. It is
//! only mutated by the gauge actor, through `merge` (inbound samples) and
//! `apply_decay` (ticker). Every mutation re-clamps to [0, 100].

pub const MIN_LEVEL: f64 = 0.0;
pub const MAX_LEVEL: f64 = 100.0;

/// Clamp to [0, 100]; NaN collapses to zero
pub fn clamp_level(level: f64) -> f64 {
    if level.is_nan() {
        return MIN_LEVEL;
    }
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}

/// How an inbound reading combines with the current level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Replace the current level
    #[default]
    Absolute,
    /// Add the reading to the current level
    Additive,
}

impl MergeMode {
    pub fn from_additive_flag(is_additive: bool) -> Self {
        if is_additive {
            MergeMode::Additive
        } else {
            MergeMode::Absolute
        }
    }

    /// Resulting level for `current` merged with `reading`
    pub fn resolve(&self, current: f64, reading: f64) -> f64 {
        match self {
            MergeMode::Additive => clamp_level(current + reading),
            MergeMode::Absolute => clamp_level(reading),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntensityState {
    level: f64,
}

impl IntensityState {
    /// Starts at zero
    pub fn new() -> Self {
        Self { level: MIN_LEVEL }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_idle(&self) -> bool {
        self.level <= MIN_LEVEL
    }

    /// Merge an inbound reading and return the new level
    pub fn merge(&mut self, reading: f64, mode: MergeMode) -> f64 {
        self.level = mode.resolve(self.level, reading);
        self.level
    }

    /// Subtract a decay amount, never going below zero
    pub fn apply_decay(&mut self, amount: f64) -> f64 {
        self.level = clamp_level(self.level - amount.max(0.0));
        self.level
    }
}
