//! Stable occurrence identity.
//!
//! A virtual occurrence has no database row, so it is addressed by a
//! composite id: the owning template's UUID plus the occurrence's day offset
//! from the series anchor. Day offsets are timezone-local calendar
//! differences, which keeps an occurrence's id stable when neighbours are
//! cancelled or extra dates are added — unlike an ordinal index, which would
//! shift every later occurrence.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;
use crate::expand::expand_in_zone;
use crate::rule::RecurrenceRule;

/// Composite id of one occurrence: `{templateId}:{offset}`.
///
/// Offset 0 is the occurrence on the anchor date itself; positive offsets
/// are later calendar days, and explicit additional dates before the anchor
/// yield negative offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OccurrenceId {
    pub template_id: Uuid,
    pub offset: i64,
}

impl OccurrenceId {
    pub fn new(template_id: Uuid, offset: i64) -> Self {
        Self {
            template_id,
            offset,
        }
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.template_id, self.offset)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid occurrence id '{0}': expected '<uuid>:<day offset>'")]
pub struct ParseOccurrenceIdError(String);

impl FromStr for OccurrenceId {
    type Err = ParseOccurrenceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uuid_part, offset_part) = s
            .split_once(':')
            .ok_or_else(|| ParseOccurrenceIdError(s.to_string()))?;
        let template_id =
            Uuid::parse_str(uuid_part).map_err(|_| ParseOccurrenceIdError(s.to_string()))?;
        let offset = offset_part
            .parse::<i64>()
            .map_err(|_| ParseOccurrenceIdError(s.to_string()))?;
        Ok(Self {
            template_id,
            offset,
        })
    }
}

/// Day offset of a local occurrence date relative to the series anchor.
pub fn offset_for(anchor_date: NaiveDate, occurrence_date: NaiveDate) -> i64 {
    (occurrence_date - anchor_date).num_days()
}

/// Local calendar date addressed by a day offset, or `None` if the
/// arithmetic leaves the supported date range.
pub fn date_for(anchor_date: NaiveDate, offset: i64) -> Option<NaiveDate> {
    anchor_date.checked_add_signed(Duration::days(offset))
}

/// Resolves a day offset back to the concrete UTC instant the rule produces
/// on that date.
///
/// Returns `Ok(None)` when the rule yields no occurrence on the addressed
/// date — the offset is an orphan (e.g. the rule was edited after a row was
/// materialized for it).
pub fn instant_for(
    rule: &RecurrenceRule,
    base_time: NaiveTime,
    offset: i64,
) -> Result<Option<DateTime<Utc>>, CoreError> {
    let Some(target) = date_for(rule.anchor_date, offset) else {
        return Ok(None);
    };
    // A narrow UTC window padded by a day on each side covers the target
    // local date in any timezone
    let start = target
        .pred_opt()
        .unwrap_or(target)
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    let end = target
        .succ_opt()
        .unwrap_or(target)
        .and_hms_opt(23, 59, 59)
        .unwrap_or_default()
        .and_utc();

    let occurrences = expand_in_zone(rule, base_time, start, end)?;
    Ok(occurrences
        .into_iter()
        .find(|z| z.date_naive() == target)
        .map(|z| z.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Frequency, Weekday, WeekdayNum};
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_display_and_parse_round_trip() {
        let id = OccurrenceId::new(Uuid::now_v7(), 42);
        let parsed: OccurrenceId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        let negative = OccurrenceId::new(id.template_id, -3);
        let parsed: OccurrenceId = negative.to_string().parse().unwrap();
        assert_eq!(parsed.offset, -3);
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        assert!("not-an-id".parse::<OccurrenceId>().is_err());
        assert!("deadbeef:5".parse::<OccurrenceId>().is_err());
        assert!(format!("{}:five", Uuid::now_v7())
            .parse::<OccurrenceId>()
            .is_err());
    }

    #[test]
    fn test_offset_round_trip() {
        let anchor = date(2025, 1, 6);
        let occurrence = date(2025, 2, 10);
        let offset = offset_for(anchor, occurrence);
        assert_eq!(offset, 35);
        assert_eq!(date_for(anchor, offset), Some(occurrence));
    }

    #[test]
    fn test_offsets_stable_when_neighbour_cancelled() {
        let anchor = date(2025, 1, 6);
        let mut rule = RecurrenceRule::new(Frequency::Weekly, anchor, "UTC");

        // Jan 20 keeps offset 14 whether or not Jan 13 is cancelled
        assert_eq!(offset_for(anchor, date(2025, 1, 20)), 14);
        rule.exception_dates = Some(vec![date(2025, 1, 13)]);
        assert_eq!(offset_for(anchor, date(2025, 1, 20)), 14);

        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let instant = instant_for(&rule, nine, 14).unwrap();
        assert_eq!(
            instant,
            Some(Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_instant_for_orphan_offset() {
        let mut rule = RecurrenceRule::new(Frequency::Weekly, date(2025, 1, 6), "UTC");
        rule.by_week_day = Some(vec![WeekdayNum::every(Weekday::Monday)]);
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        // Offset 1 is a Tuesday; the rule never produces it
        assert_eq!(instant_for(&rule, nine, 1).unwrap(), None);
        // Offset 7 is the next Monday
        assert!(instant_for(&rule, nine, 7).unwrap().is_some());
    }

    #[test]
    fn test_instant_for_respects_rule_timezone() {
        let rule = RecurrenceRule::new(Frequency::Daily, date(2025, 6, 1), "America/New_York");
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        let instant = instant_for(&rule, nine, 0).unwrap();
        assert_eq!(
            instant,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap())
        );
    }
}
