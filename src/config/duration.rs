// src/config/duration.rs

//! Duration and wait-window parsing shared by the CLI and the config file.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
///
/// A bare `"0"` is accepted as zero so that `wait = "5s:0"` reads naturally.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' missing unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' out of range"))
}

/// Quiescence window: `min` of calm before applying a change, and an
/// optional `max` ceiling on how long a burst may postpone it.
///
/// `max == 0` means there is no ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitBounds {
    pub min: Duration,
    pub max: Duration,
}

impl WaitBounds {
    pub fn new(min: Duration, max: Duration) -> Result<Self, String> {
        if !max.is_zero() && min > max {
            return Err(format!(
                "wait minimum ({min:?}) must be less than or equal to maximum ({max:?})"
            ));
        }
        Ok(Self { min, max })
    }

    /// The ceiling, if one is configured.
    pub fn ceiling(&self) -> Option<Duration> {
        if self.max.is_zero() { None } else { Some(self.max) }
    }
}

impl FromStr for WaitBounds {
    type Err = String;

    /// Accepts `min` or `min:max`. A lone `min` implies `max = 4 * min`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some((min, max)) => {
                let min = parse_duration(min)?;
                let max = parse_duration(max)?;
                WaitBounds::new(min, max)
            }
            None => {
                let min = parse_duration(s)?;
                let max = min
                    .checked_mul(4)
                    .ok_or_else(|| format!("wait '{s}' out of range"))?;
                WaitBounds::new(min, max)
            }
        }
    }
}

impl fmt::Display for WaitBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{:?}", self.min, self.max)
    }
}
