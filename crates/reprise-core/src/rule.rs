//! The recurrence rule value object.
//!
//! A [`RecurrenceRule`] is an immutable description of a repetition pattern:
//! a frequency, an interval, the RFC 5545-style `byX` constraint sets, an end
//! condition, explicit exception/additional dates, and the IANA timezone and
//! anchor date the series is computed relative to.
//!
//! Rules are persisted as JSON. The serde model is deliberately strict:
//! unknown fields are rejected rather than silently dropped, a payload
//! without a `frequency` fails to deserialize, and every `byX` set keeps its
//! absent-vs-empty distinction across a round trip (`None` is omitted,
//! `Some(vec![])` serializes as `[]`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// How often the series repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Secondly => write!(f, "secondly"),
            Frequency::Minutely => write!(f, "minutely"),
            Frequency::Hourly => write!(f, "hourly"),
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "secondly" => Ok(Frequency::Secondly),
            "minutely" => Ok(Frequency::Minutely),
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

/// Day of the week, serialized with the RFC 5545 two-letter codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Weekday {
    #[serde(rename = "MO")]
    Monday,
    #[serde(rename = "TU")]
    Tuesday,
    #[serde(rename = "WE")]
    Wednesday,
    #[serde(rename = "TH")]
    Thursday,
    #[serde(rename = "FR")]
    Friday,
    #[serde(rename = "SA")]
    Saturday,
    #[serde(rename = "SU")]
    Sunday,
}

impl Weekday {
    pub fn to_chrono(self) -> chrono::Weekday {
        match self {
            Weekday::Monday => chrono::Weekday::Mon,
            Weekday::Tuesday => chrono::Weekday::Tue,
            Weekday::Wednesday => chrono::Weekday::Wed,
            Weekday::Thursday => chrono::Weekday::Thu,
            Weekday::Friday => chrono::Weekday::Fri,
            Weekday::Saturday => chrono::Weekday::Sat,
            Weekday::Sunday => chrono::Weekday::Sun,
        }
    }

    pub fn from_chrono(weekday: chrono::Weekday) -> Self {
        match weekday {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

/// A weekday constraint with an optional ordinal, e.g. "3rd Tuesday" or
/// "last Friday" (`ordinal = -1`). Without an ordinal it matches every
/// occurrence of that weekday within the expansion period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WeekdayNum {
    pub weekday: Weekday,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<i8>,
}

impl WeekdayNum {
    pub fn every(weekday: Weekday) -> Self {
        Self {
            weekday,
            ordinal: None,
        }
    }

    pub fn nth(weekday: Weekday, ordinal: i8) -> Self {
        Self {
            weekday,
            ordinal: Some(ordinal),
        }
    }
}

/// When the series stops producing occurrences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type")]
pub enum EndCondition {
    #[default]
    Never,
    /// Occurrences strictly after this date are dropped (the date itself is
    /// still included).
    Until { date: NaiveDate },
    /// The series ends after this many occurrences, counted from the anchor.
    Count { count: u32 },
}

fn default_interval() -> u32 {
    1
}

fn default_week_start() -> Weekday {
    Weekday::Monday
}

/// Immutable repetition pattern for a recurring template.
///
/// See the module docs for the serde contract. Field semantics follow
/// RFC 5545 conventions: negative `byMonthDay`/`byYearDay`/`byWeekNo`/
/// `bySetPos` members count from the end of their period (`-1` is "last"),
/// and zero is invalid everywhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_week_day: Option<Vec<WeekdayNum>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_month_day: Option<Vec<i8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_set_pos: Option<Vec<i8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_month: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_hour: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_minute: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_second: Option<Vec<u8>>,
    /// Only meaningful for YEARLY rules; any other frequency expands to
    /// nothing when this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_week_no: Option<Vec<i8>>,
    /// Only meaningful for YEARLY rules; any other frequency expands to
    /// nothing when this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_year_day: Option<Vec<i16>>,
    #[serde(default = "default_week_start")]
    pub week_start: Weekday,
    #[serde(default)]
    pub end_condition: EndCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_dates: Option<Vec<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_dates: Option<Vec<NaiveDate>>,
    /// IANA zone id used to interpret all dates and times in the rule.
    pub timezone: String,
    /// The reference date the series is computed relative to.
    pub anchor_date: NaiveDate,
}

impl RecurrenceRule {
    /// A bare rule that repeats on `anchor + n * interval` units of
    /// `frequency`, with no `byX` constraints.
    pub fn new(frequency: Frequency, anchor_date: NaiveDate, timezone: impl Into<String>) -> Self {
        Self {
            frequency,
            interval: 1,
            by_week_day: None,
            by_month_day: None,
            by_set_pos: None,
            by_month: None,
            by_hour: None,
            by_minute: None,
            by_second: None,
            by_week_no: None,
            by_year_day: None,
            week_start: Weekday::Monday,
            end_condition: EndCondition::Never,
            exception_dates: None,
            additional_dates: None,
            timezone: timezone.into(),
            anchor_date,
        }
    }

    /// Stable fingerprint of the rule contents, used to key per-series
    /// caches. A rule edit changes the fingerprint, which is what retires
    /// stale cache entries.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        // serde_json emits struct fields in declaration order, so the
        // canonical JSON form is stable for identical rules.
        serde_json::to_string(self)
            .unwrap_or_default()
            .hash(&mut hasher);
        hasher.finish()
    }
}
