use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, SubsecRound, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Wall-clock instant with an explicit UTC offset.
///
/// The text form is `YYYY-MM-DD HH:MM:SS ±HHMM` (local time followed by
/// the offset), always 25 characters for years 1000..=9999. Parsing the
/// text form gives back the same instant *and* the same offset, so the
/// offset must be a whole number of minutes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    /// `strftime` pattern of the text form.
    pub const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S %z";

    /// Length of the text form.
    pub const TEXT_LEN: usize = 25;

    /// The current time in the local time zone, truncated to whole seconds.
    pub fn now() -> Self {
        Self(Local::now().fixed_offset().trunc_subsecs(0))
    }

    /// Build from seconds since the UNIX epoch and an offset east of UTC.
    pub fn from_epoch(epoch_seconds: i64, offset_seconds: i32) -> Result<Self, TypeError> {
        let invalid = |reason: String| TypeError::InvalidTimestamp {
            value: format!("{epoch_seconds}@{offset_seconds}"),
            reason,
        };
        if offset_seconds % 60 != 0 {
            return Err(invalid("offset must be a whole number of minutes".into()));
        }
        let offset = FixedOffset::east_opt(offset_seconds)
            .ok_or_else(|| invalid("offset out of range".into()))?;
        let datetime = offset
            .timestamp_opt(epoch_seconds, 0)
            .single()
            .ok_or_else(|| invalid("instant out of range".into()))?;
        Ok(Self(datetime))
    }

    /// Parse the `YYYY-MM-DD HH:MM:SS ±HHMM` text form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() != Self::TEXT_LEN {
            return Err(TypeError::InvalidTimestamp {
                value: s.to_string(),
                reason: format!("expected {} characters, got {}", Self::TEXT_LEN, s.len()),
            });
        }
        DateTime::parse_from_str(s, Self::FORMAT)
            .map(Self)
            .map_err(|e| TypeError::InvalidTimestamp {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Seconds since the UNIX epoch.
    pub fn epoch_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Offset east of UTC, in seconds.
    pub fn offset_seconds(&self) -> i32 {
        self.0.offset().local_minus_utc()
    }

    /// The text form.
    pub fn format(&self) -> String {
        self.0.format(Self::FORMAT).to_string()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.format())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for Timestamp {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
