//! Clock configuration.
//!
//! Holds the user-facing clock parameters with their defaults and persists
//! them as JSON.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::clock::{ClockSpec, Timestamp};
use crate::core::{Error, Result};

/// 1900-01-01T00:00:00Z in nanoseconds.
pub const DEFAULT_BEGIN_NS: Timestamp = -2_208_988_800_000_000_000;

/// 2100-01-01T00:00:00Z in nanoseconds.
pub const DEFAULT_END_NS: Timestamp = 4_102_444_800_000_000_000;

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Timezone in which `begin` and `end` are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timezone {
    #[default]
    UTC,
    /// Fixed offset east of UTC, in seconds.
    Fixed(i32),
}

impl Timezone {
    /// Offset from UTC in seconds.
    pub fn offset_seconds(&self) -> i32 {
        match self {
            Timezone::UTC => 0,
            Timezone::Fixed(offset) => *offset,
        }
    }

    /// Convert a wall-clock timestamp in this timezone to UTC.
    pub fn to_utc(&self, local_ns: Timestamp) -> Result<Timestamp> {
        let offset_ns = i64::from(self.offset_seconds()) * NANOS_PER_SECOND;
        local_ns
            .checked_sub(offset_ns)
            .ok_or_else(|| Error::Config(format!("timestamp {local_ns} out of range for {self}")))
    }
}

impl FromStr for Timezone {
    type Err = Error;

    /// Accepts `UTC`, `Z`, or a `+HHMM` / `-HHMM` offset.
    fn from_str(s: &str) -> Result<Self> {
        if matches!(s, "UTC" | "Z") {
            return Ok(Timezone::UTC);
        }
        let invalid = || Error::Config(format!("invalid timezone: {s}"));
        let (sign, digits) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }
        let offset = sign * (hours * 3600 + minutes * 60);
        Ok(if offset == 0 {
            Timezone::UTC
        } else {
            Timezone::Fixed(offset)
        })
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timezone::UTC => f.write_str("UTC"),
            Timezone::Fixed(offset) => {
                let sign = if *offset < 0 { '-' } else { '+' };
                let abs = offset.unsigned_abs();
                write!(f, "{sign}{:02}{:02}", abs / 3600, abs % 3600 / 60)
            }
        }
    }
}

impl TryFrom<String> for Timezone {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Timezone> for String {
    fn from(value: Timezone) -> Self {
        value.to_string()
    }
}

/// Clock parameters as supplied by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// First timestamp, wall clock in `timezone`.
    /// Default: 1900-01-01
    pub begin: Timestamp,

    /// Last timestamp (inclusive), wall clock in `timezone`.
    /// Default: 2100-01-01
    pub end: Timestamp,

    /// Tick spacing in nanoseconds.
    /// Default: 1 second
    pub frequency: i64,

    /// Tick phase relative to `begin`, in nanoseconds.
    /// Default: 0
    pub offset: i64,

    /// Target partition count.
    /// Default: 1
    pub num_partitions: usize,

    /// Default: UTC
    pub timezone: Timezone,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            begin: DEFAULT_BEGIN_NS,
            end: DEFAULT_END_NS,
            frequency: NANOS_PER_SECOND,
            offset: 0,
            num_partitions: 1,
            timezone: Timezone::UTC,
        }
    }
}

impl ClockConfig {
    /// Resolve into a UTC clock specification.
    ///
    /// # Errors
    ///
    /// - `Error::Config`: `begin` or `end` cannot be shifted to UTC
    pub fn to_spec(&self) -> Result<ClockSpec> {
        Ok(ClockSpec {
            begin: self.timezone.to_utc(self.begin)?,
            end: self.timezone.to_utc(self.end)?,
            frequency: self.frequency,
            offset: self.offset,
            num_partitions: self.num_partitions,
        })
    }

    /// Load a config from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))
    }

    /// Save the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| Error::Config(err.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}
