use crate::error::CoreError;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    Tz::from_str(timezone)
        .map(|_| ())
        .map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Parse an IANA timezone name into a `Tz`
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone).map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Resolve a local wall-clock datetime to a zoned datetime.
///
/// Ambiguous times (fall-back transitions) resolve to the earlier offset.
/// Nonexistent times (spring-forward gaps) are shifted one hour later, which
/// is where the wall clock actually lands on such days.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local).earliest() {
        Some(zoned) => zoned,
        None => {
            let shifted = local + Duration::hours(1);
            match tz.from_local_datetime(&shifted).earliest() {
                Some(zoned) => zoned,
                // Degenerate zone data; fall back to interpreting as UTC
                None => tz.from_utc_datetime(&local),
            }
        }
    }
}

/// Convert a UTC instant to the wall-clock datetime in the given zone
pub fn to_local(tz: Tz, instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}
