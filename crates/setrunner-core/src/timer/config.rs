//! Session setup and its validation.
//!
//! A [`SessionConfig`] is only ever produced by [`validate`] (from raw form
//! text) or re-checked with [`SessionConfig::validate`] when it comes back out
//! of storage. The engine assumes every config it sees is well formed.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MAX_STEPS: u32 = 50;
pub const MAX_DURATION_SECS: u32 = 3600;
pub const MAX_SETS: u32 = 100;
pub const MAX_DELAY_SECS: u32 = 3600;
/// Upper bound on `steps * sets`, i.e. on rendered progress cells.
pub const MAX_GRID_CELLS: u64 = 5000;
/// Input cap on the session name. Enforced by callers, not by [`validate`].
pub const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterType {
    /// Step clock runs from 0 up to `duration`.
    #[default]
    Up,
    /// Step clock runs from `duration` down to 0.
    Down,
}

impl std::fmt::Display for CounterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterType::Up => f.write_str("UP"),
            CounterType::Down => f.write_str("DOWN"),
        }
    }
}

impl std::str::FromStr for CounterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(CounterType::Up),
            "down" => Ok(CounterType::Down),
            other => Err(format!("unknown counter type '{other}' (expected up or down)")),
        }
    }
}

/// A validated session setup. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub name: String,
    /// Timed intervals per set.
    pub steps: u32,
    /// Seconds per step.
    pub duration: u32,
    pub sets: u32,
    /// Rest seconds between sets. Not applied after the final set.
    pub delay: u32,
    pub counter_type: CounterType,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            steps: 3,
            duration: 10,
            sets: 2,
            delay: 5,
            counter_type: CounterType::Up,
        }
    }
}

impl SessionConfig {
    /// Re-check range rules on an already typed config.
    ///
    /// # Errors
    /// Returns the first rule violated, in the same order as [`validate`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_ranges(self.steps, self.duration, self.sets, self.delay)
    }

    /// Step clock value at the start of every step.
    pub fn initial_clock(&self) -> u32 {
        match self.counter_type {
            CounterType::Up => 0,
            CounterType::Down => self.duration,
        }
    }

    /// Number of one-second ticks from a fresh start to completion.
    pub fn total_ticks(&self) -> u64 {
        let steps = u64::from(self.steps);
        let sets = u64::from(self.sets);
        steps * u64::from(self.duration) * sets + sets.saturating_sub(1) * u64::from(self.delay)
    }

    pub fn total_cells(&self) -> u64 {
        u64::from(self.steps) * u64::from(self.sets)
    }

    /// Name to show for the session, falling back to a generic label.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Untitled Session"
        } else {
            &self.name
        }
    }
}

/// Unparsed setup fields as they arrive from a form or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSessionInput {
    pub name: String,
    pub steps: String,
    pub duration: String,
    pub sets: String,
    pub delay: String,
    pub counter_type: CounterType,
}

impl From<&SessionConfig> for RawSessionInput {
    fn from(config: &SessionConfig) -> Self {
        Self {
            name: config.name.clone(),
            steps: config.steps.to_string(),
            duration: config.duration.to_string(),
            sets: config.sets.to_string(),
            delay: config.delay.to_string(),
            counter_type: config.counter_type,
        }
    }
}

/// Validate raw setup input into a [`SessionConfig`].
///
/// Rules are applied in order and the first failure wins: every numeric field
/// must be a positive integer, then the grid (`steps * sets`) must fit, then
/// each field must be within its maximum. The name is trimmed.
///
/// # Errors
/// Returns a [`ValidationError`] describing the first rule violated.
pub fn validate(input: &RawSessionInput) -> Result<SessionConfig, ValidationError> {
    let steps = parse_positive(&input.steps)?;
    let duration = parse_positive(&input.duration)?;
    let sets = parse_positive(&input.sets)?;
    let delay = parse_positive(&input.delay)?;

    check_ranges(steps, duration, sets, delay)?;

    Ok(SessionConfig {
        name: input.name.trim().to_string(),
        steps,
        duration,
        sets,
        delay,
        counter_type: input.counter_type,
    })
}

fn parse_positive(raw: &str) -> Result<u32, ValidationError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotPositive)?;
    if value <= 0 {
        return Err(ValidationError::NotPositive);
    }
    // Anything past u32 is far beyond every maximum anyway.
    Ok(u32::try_from(value).unwrap_or(u32::MAX))
}

fn check_ranges(steps: u32, duration: u32, sets: u32, delay: u32) -> Result<(), ValidationError> {
    if [steps, duration, sets, delay].contains(&0) {
        return Err(ValidationError::NotPositive);
    }

    // The grid cap is reported ahead of the per-field maxima so that an
    // oversized grid always names its product (51 x 100 says 5100).
    let total = u64::from(steps) * u64::from(sets);
    if total > MAX_GRID_CELLS {
        return Err(ValidationError::GridTooLarge {
            total,
            limit: MAX_GRID_CELLS,
        });
    }

    let limits = [
        ("Steps per set", steps, MAX_STEPS),
        ("Duration per step", duration, MAX_DURATION_SECS),
        ("Number of sets", sets, MAX_SETS),
        ("Delay between sets", delay, MAX_DELAY_SECS),
    ];
    for (field, value, max) in limits {
        if value > max {
            return Err(ValidationError::OutOfRange { field, max });
        }
    }
    Ok(())
}
