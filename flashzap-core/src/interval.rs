use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const DEFAULT_GROWTH_RATE: f64 = 0.1;

/// Maps a mastery level to the number of days until the card is due again.
///
/// Exactly one model is active for a running process; it is picked when the
/// configuration is loaded and handed to the scheduler explicitly.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalModel {
    /// `f(0) = 0`, `f(1) = 1`, `f(n) = f(n-1) + (1 + rate)^(n-1)`.
    Exponential { growth_rate: f64 },
    /// Fixed day count per level. Levels past the end reuse the last entry.
    Table { days: Vec<u32> },
}

impl Default for IntervalModel {
    fn default() -> Self {
        IntervalModel::Exponential {
            growth_rate: DEFAULT_GROWTH_RATE,
        }
    }
}

impl IntervalModel {
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            IntervalModel::Exponential { growth_rate } => {
                if !growth_rate.is_finite() || *growth_rate < 0.0 {
                    return Err(CoreError::Invalid("growth rate must be a finite number >= 0"));
                }
            }
            IntervalModel::Table { days } => {
                if days.is_empty() {
                    return Err(CoreError::Invalid("interval table is empty"));
                }
            }
        }
        Ok(())
    }

    /// Real-valued interval. Callers must floor it, see [`IntervalModel::day_offset`].
    pub fn interval_days(&self, level: u32) -> f64 {
        match self {
            IntervalModel::Exponential { growth_rate } => exponential_interval(level, *growth_rate),
            IntervalModel::Table { days } => {
                let idx = (level as usize).min(days.len().saturating_sub(1));
                days.get(idx).copied().unwrap_or(0) as f64
            }
        }
    }

    /// Whole days to add to today. Truncates toward zero, never rounds up.
    pub fn day_offset(&self, level: u32) -> u64 {
        let days = self.interval_days(level).floor();
        if days.is_nan() || days <= 0.0 {
            0
        } else if days >= u64::MAX as f64 {
            u64::MAX
        } else {
            days as u64
        }
    }
}

// Iterative form of the recursive definition: 1 + sum of (1 + rate)^i for i in 1..level.
fn exponential_interval(level: u32, growth_rate: f64) -> f64 {
    match level {
        0 => 0.0,
        1 => 1.0,
        n if growth_rate == 0.0 => n as f64,
        n => {
            let factor = 1.0 + growth_rate;
            let mut total = 1.0;
            let mut term = 1.0;
            for _ in 1..n {
                term *= factor;
                total += term;
                if total.is_infinite() {
                    break;
                }
            }
            total
        }
    }
}
