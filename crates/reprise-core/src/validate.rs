//! Recurrence rule validation.
//!
//! Pure functions, no I/O, no global validator instance: callers pass an
//! explicit [`ValidationMode`] instead of relying on annotation groups.
//! Errors are accumulated rather than short-circuited so a single form
//! submission can report every problem at once.

use thiserror::Error;

use crate::rule::{EndCondition, RecurrenceRule};
use crate::timezone::validate_timezone;

/// Which lifecycle operation the rule is being validated for.
///
/// `Create` enforces the full contract for a brand-new series, including
/// that the end condition leaves at least the anchor occurrence alive.
/// `Update` relaxes that one check: a this-and-future split legitimately
/// truncates the original series to the day before the split point, which
/// for a split at the first occurrence is `anchor - 1` day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Create,
    Update,
}

/// A single problem with a rule, keyed by the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validates a rule's internal consistency.
///
/// Returns every problem found; an empty error list is impossible (the
/// `Err` variant always carries at least one entry).
pub fn validate(
    rule: &RecurrenceRule,
    mode: ValidationMode,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if rule.interval < 1 {
        errors.push(ValidationError::new(
            "interval",
            format!("must be at least 1, got {}", rule.interval),
        ));
    }

    check_signed_set(
        &mut errors,
        "byMonthDay",
        rule.by_month_day.as_deref(),
        1..=31,
    );
    check_signed_set(&mut errors, "bySetPos", rule.by_set_pos.as_deref(), 1..=5);
    check_signed_set(&mut errors, "byWeekNo", rule.by_week_no.as_deref(), 1..=53);
    check_signed_set(
        &mut errors,
        "byYearDay",
        rule.by_year_day.as_deref(),
        1..=366,
    );

    check_unsigned_set(&mut errors, "byMonth", rule.by_month.as_deref(), 1..=12);
    check_unsigned_set(&mut errors, "byHour", rule.by_hour.as_deref(), 0..=23);
    check_unsigned_set(&mut errors, "byMinute", rule.by_minute.as_deref(), 0..=59);
    check_unsigned_set(&mut errors, "bySecond", rule.by_second.as_deref(), 0..=59);

    if let Some(days) = rule.by_week_day.as_deref() {
        for day in days {
            if let Some(ordinal) = day.ordinal {
                if ordinal == 0 || !(-5..=5).contains(&ordinal) {
                    errors.push(ValidationError::new(
                        "byWeekDay",
                        format!("ordinal {} out of range [-5,-1] or [1,5]", ordinal),
                    ));
                }
            }
        }
    }

    match rule.end_condition {
        EndCondition::Never => {}
        EndCondition::Count { count } => {
            if count < 1 {
                errors.push(ValidationError::new(
                    "endCondition",
                    "count must be at least 1",
                ));
            }
        }
        EndCondition::Until { date } => {
            if mode == ValidationMode::Create && date < rule.anchor_date {
                errors.push(ValidationError::new(
                    "endCondition",
                    format!(
                        "until date {} precedes anchor date {}; the rule would never produce an occurrence",
                        date, rule.anchor_date
                    ),
                ));
            }
        }
    }

    if validate_timezone(&rule.timezone).is_err() {
        errors.push(ValidationError::new(
            "timezone",
            format!("unknown IANA zone id '{}'", rule.timezone),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A signed `byX` set: each member must fall in `positive` or its negated
/// mirror. Zero is always invalid.
fn check_signed_set<T>(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    values: Option<&[T]>,
    positive: std::ops::RangeInclusive<i32>,
) where
    T: Copy + Into<i32> + std::fmt::Display,
{
    let Some(values) = values else { return };
    for value in values {
        let v: i32 = (*value).into();
        let in_range = positive.contains(&v) || positive.contains(&-v);
        if v == 0 || !in_range {
            errors.push(ValidationError::new(
                field,
                format!(
                    "{} out of range [-{end},-1] or [1,{end}]",
                    value,
                    end = positive.end()
                ),
            ));
        }
    }
}

fn check_unsigned_set(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    values: Option<&[u8]>,
    range: std::ops::RangeInclusive<u8>,
) {
    let Some(values) = values else { return };
    for value in values {
        if !range.contains(value) {
            errors.push(ValidationError::new(
                field,
                format!(
                    "{} out of range [{},{}]",
                    value,
                    range.start(),
                    range.end()
                ),
            ));
        }
    }
}
