//! Windowed occurrence expansion.
//!
//! [`expand`] turns a validated [`RecurrenceRule`] plus a caller-supplied
//! query window into the ordered, deduplicated set of occurrence instants
//! inside that window. The algorithm is the RFC 5545-style two-phase scheme:
//! coarse-step candidate periods (day/week/month/year, or raw instants for
//! sub-daily frequencies) from the anchor, fine-filter each period through
//! the `byX` constraints in priority order, select with `bySetPos`, merge
//! exception/additional dates, then truncate by the end condition.
//!
//! Expansion is a pure function of its inputs: the same `(rule, base time,
//! window)` triple always yields the same sequence, and no actually-infinite
//! series is ever materialized — every scan is bounded by the window, the
//! rule's end condition, and a hard period ceiling.
//!
//! The one sub-computation that cannot be windowed locally is a
//! `Count`-bounded series queried far from its anchor: the number of
//! occurrences preceding the window must be known before anything can be
//! emitted. That pre-window count is memoized per rule fingerprint so
//! repeated queries do not re-walk the series from the anchor.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, OnceLock};

use crate::error::CoreError;
use crate::rule::{EndCondition, Frequency, RecurrenceRule, WeekdayNum};
use crate::timezone::{parse_timezone, resolve_local};

/// Widest window a single expansion call will serve, in days (~10 years).
pub const MAX_WINDOW_DAYS: i64 = 3660;

/// Hard ceiling on coarse-stepped periods per scan, so that no
/// interval/frequency combination can stall the expander.
const MAX_PERIODS: u64 = 100_000;

/// Pre-window occurrence counts for `Count`-bounded rules, keyed by rule
/// fingerprint and window start date. A rule edit changes the fingerprint,
/// so stale entries are never consulted again.
fn count_cache() -> &'static Mutex<HashMap<(u64, NaiveDate), u64>> {
    static CACHE: OnceLock<Mutex<HashMap<(u64, NaiveDate), u64>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Expands the rule into UTC instants within `[window_start, window_end]`.
pub fn expand(
    rule: &RecurrenceRule,
    base_time: NaiveTime,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, CoreError> {
    let zoned = expand_in_zone(rule, base_time, window_start, window_end)?;
    Ok(zoned.into_iter().map(|z| z.with_timezone(&Utc)).collect())
}

/// Expands the rule into zoned instants within `[window_start, window_end]`.
///
/// Identical to [`expand`] but keeps the rule's timezone attached, which
/// callers computing day offsets need.
pub fn expand_in_zone(
    rule: &RecurrenceRule,
    base_time: NaiveTime,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<DateTime<Tz>>, CoreError> {
    check_window(window_start, window_end)?;
    let tz = parse_timezone(&rule.timezone)?;
    let ws_local = window_start.with_timezone(&tz).naive_local();
    let we_local = window_end.with_timezone(&tz).naive_local();

    let scanner = Scanner::new(rule, base_time);
    let mut generated: Vec<NaiveDateTime> = Vec::new();
    if !scanner.unsatisfiable() {
        scanner.scan(ws_local, we_local, |c| generated.push(c))?;
    }

    // Exception/addition merge order matters: EXDATE first, then RDATE, so a
    // date listed in both sets ends up present.
    if let Some(exceptions) = &rule.exception_dates {
        generated.retain(|c| !exceptions.contains(&c.date()));
    }
    if let Some(additions) = &rule.additional_dates {
        for date in additions {
            let candidate = date.and_time(base_time);
            if candidate >= ws_local && candidate <= we_local {
                generated.push(candidate);
            }
        }
    }
    generated.sort();
    generated.dedup();

    // End-condition truncation applies to the merged set as the final step
    if let EndCondition::Until { date } = rule.end_condition {
        generated.retain(|c| c.date() <= date);
    }

    let mut out = Vec::with_capacity(generated.len());
    for candidate in generated {
        let zoned = resolve_local(tz, candidate);
        let utc = zoned.with_timezone(&Utc);
        if utc >= window_start && utc <= window_end {
            out.push(zoned);
        }
    }
    Ok(out)
}

/// Number of rule-generated occurrences strictly before the given local
/// date, counted from the series anchor. Memoized per rule fingerprint.
///
/// Explicit additional dates are not counted; the end-condition count, like
/// RFC 5545's COUNT, binds the generated pattern only.
pub fn occurrences_before(
    rule: &RecurrenceRule,
    base_time: NaiveTime,
    before: NaiveDate,
) -> Result<u64, CoreError> {
    if before <= rule.anchor_date {
        return Ok(0);
    }
    let scanner = Scanner::new(rule, base_time);
    if scanner.unsatisfiable() {
        return Ok(0);
    }

    let key = (scanner.fingerprint, before);
    if let Ok(cache) = count_cache().lock() {
        if let Some(&count) = cache.get(&key) {
            return Ok(count);
        }
    }

    let limit = match rule.end_condition {
        EndCondition::Count { count } => Some(u64::from(count)),
        _ => None,
    };
    let until = match rule.end_condition {
        EndCondition::Until { date } => Some(date),
        _ => None,
    };
    let last = before.pred_opt().unwrap_or(before);
    let stop = until.map_or(last, |u| last.min(u));

    let mut count = 0u64;
    let mut k = 0u64;
    let mut periods = 0u64;
    'outer: loop {
        if periods >= MAX_PERIODS {
            break;
        }
        periods += 1;
        let Some(period) = scanner.period(k) else {
            break;
        };
        if period.start_date() > stop {
            break;
        }
        for candidate in scanner.period_candidates(&period) {
            if candidate < scanner.anchor_local {
                continue;
            }
            if candidate.date() >= before {
                break 'outer;
            }
            if let Some(u) = until {
                if candidate.date() > u {
                    break 'outer;
                }
            }
            count += 1;
            if let Some(l) = limit {
                if count >= l {
                    break 'outer;
                }
            }
        }
        k += 1;
    }

    if let Ok(mut cache) = count_cache().lock() {
        cache.insert(key, count);
    }
    Ok(count)
}

/// Finds the first occurrence strictly after the given instant, scanning up
/// to ten years ahead before concluding the series has ended.
pub fn next_occurrence_after(
    rule: &RecurrenceRule,
    base_time: NaiveTime,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, CoreError> {
    let mut start = after;
    for _ in 0..10 {
        let end = start + Duration::days(366);
        let occurrences = expand(rule, base_time, start, end)?;
        if let Some(next) = occurrences.into_iter().find(|&o| o > after) {
            return Ok(Some(next));
        }
        start = end;
    }
    Ok(None)
}

/// Preview the next `count` occurrences from the given instant, looking
/// ahead at most one year.
pub fn preview_occurrences(
    rule: &RecurrenceRule,
    base_time: NaiveTime,
    from: DateTime<Utc>,
    count: usize,
) -> Result<Vec<DateTime<Utc>>, CoreError> {
    let end = from + Duration::days(366);
    let mut occurrences = expand(rule, base_time, from, end)?;
    occurrences.truncate(count);
    Ok(occurrences)
}

fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), CoreError> {
    if end < start {
        return Err(CoreError::ExpansionBounds(format!(
            "window end {} precedes window start {}",
            end, start
        )));
    }
    if end - start > Duration::days(MAX_WINDOW_DAYS) {
        return Err(CoreError::ExpansionBounds(format!(
            "window exceeds the maximum span of {} days",
            MAX_WINDOW_DAYS
        )));
    }
    Ok(())
}

/// A coarse-stepped candidate period.
#[derive(Debug, Clone, Copy)]
enum Period {
    /// Sub-daily frequencies step raw instants
    Instant(NaiveDateTime),
    Day(NaiveDate),
    /// Start of the week, aligned to the rule's week start
    Week(NaiveDate),
    Month { year: i32, month: u32 },
    Year(i32),
}

impl Period {
    fn start_date(&self) -> NaiveDate {
        match *self {
            Period::Instant(dt) => dt.date(),
            Period::Day(d) | Period::Week(d) => d,
            Period::Month { year, month } => first_of_month(year, month),
            Period::Year(year) => first_of_year(year),
        }
    }
}

/// Which period an ordinal weekday constraint counts within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrdinalScope {
    Month,
    Year,
    /// Daily/weekly periods have no meaningful ordinal; match by weekday only
    Ignored,
}

/// The fine-filtering half of the expander: owns the derived state a single
/// scan needs and knows which days and times of a period satisfy the rule.
struct Scanner<'a> {
    rule: &'a RecurrenceRule,
    base_time: NaiveTime,
    anchor_local: NaiveDateTime,
    week_start: chrono::Weekday,
    /// Time-of-day expansion (cartesian byHour x byMinute x bySecond, with
    /// absent dimensions inherited from the base time), sorted
    times: Vec<NaiveTime>,
    fingerprint: u64,
}

impl<'a> Scanner<'a> {
    fn new(rule: &'a RecurrenceRule, base_time: NaiveTime) -> Self {
        let hours: Vec<u32> = match &rule.by_hour {
            Some(set) => set.iter().map(|&h| u32::from(h)).collect(),
            None => vec![base_time.hour()],
        };
        let minutes: Vec<u32> = match &rule.by_minute {
            Some(set) => set.iter().map(|&m| u32::from(m)).collect(),
            None => vec![base_time.minute()],
        };
        let seconds: Vec<u32> = match &rule.by_second {
            Some(set) => set.iter().map(|&s| u32::from(s)).collect(),
            None => vec![base_time.second()],
        };
        let mut times = Vec::with_capacity(hours.len() * minutes.len() * seconds.len());
        for &h in &hours {
            for &m in &minutes {
                for &s in &seconds {
                    if let Some(t) = NaiveTime::from_hms_opt(h, m, s) {
                        times.push(t);
                    }
                }
            }
        }
        times.sort();
        times.dedup();

        let mut hasher = DefaultHasher::new();
        rule.fingerprint().hash(&mut hasher);
        base_time.hash(&mut hasher);

        Self {
            rule,
            base_time,
            anchor_local: rule.anchor_date.and_time(base_time),
            week_start: rule.week_start.to_chrono(),
            times,
            fingerprint: hasher.finish(),
        }
    }

    /// Constraint combinations that can never match: byWeekNo/byYearDay are
    /// yearly-period concepts, so any other frequency expands to nothing
    /// (accepted by the validator, empty by construction here).
    fn unsatisfiable(&self) -> bool {
        self.rule.frequency != Frequency::Yearly
            && (self.rule.by_week_no.is_some() || self.rule.by_year_day.is_some())
    }

    /// Runs the coarse/fine scan, invoking `emit` for every generated
    /// candidate inside the local window, in ascending order.
    fn scan(
        &self,
        ws: NaiveDateTime,
        we: NaiveDateTime,
        mut emit: impl FnMut(NaiveDateTime),
    ) -> Result<(), CoreError> {
        let limit = match self.rule.end_condition {
            EndCondition::Count { count } => Some(u64::from(count)),
            _ => None,
        };
        let until = match self.rule.end_condition {
            EndCondition::Until { date } => Some(date),
            _ => None,
        };

        // Count-bounded rules need the occurrence total from the series
        // anchor, not just from the window; everything before the window is
        // accounted for once (memoized) and skipped during the scan itself.
        let (mut count, counted_boundary) = if limit.is_some() {
            let before = occurrences_before(self.rule, self.base_time, ws.date())?;
            (before, Some(ws.date()))
        } else {
            (0, None)
        };
        if let Some(l) = limit {
            if count >= l {
                return Ok(());
            }
        }

        let stop = until.map_or(we.date(), |u| we.date().min(u));
        let mut k = self.skip_to(ws);
        let mut periods = 0u64;
        'outer: loop {
            if periods >= MAX_PERIODS {
                break;
            }
            periods += 1;
            let Some(period) = self.period(k) else {
                break;
            };
            if period.start_date() > stop {
                break;
            }
            for candidate in self.period_candidates(&period) {
                if candidate < self.anchor_local {
                    continue;
                }
                // Already rolled into the pre-window count
                if let Some(boundary) = counted_boundary {
                    if candidate.date() < boundary {
                        continue;
                    }
                }
                if let Some(u) = until {
                    if candidate.date() > u {
                        break 'outer;
                    }
                }
                if let Some(l) = limit {
                    if count >= l {
                        break 'outer;
                    }
                    count += 1;
                }
                if candidate >= ws && candidate <= we {
                    emit(candidate);
                }
            }
            k += 1;
        }
        Ok(())
    }

    /// First period index whose span could intersect the window start.
    /// Floor division keeps the period containing the boundary.
    fn skip_to(&self, ws: NaiveDateTime) -> u64 {
        let interval = i64::from(self.rule.interval.max(1));
        let anchor = self.rule.anchor_date;
        let diff_units = match self.rule.frequency {
            Frequency::Daily => (ws.date() - anchor).num_days(),
            Frequency::Weekly => {
                let anchor_week = week_start_of(anchor, self.week_start);
                let window_week = week_start_of(ws.date(), self.week_start);
                (window_week - anchor_week).num_days() / 7
            }
            Frequency::Monthly => month_index(ws.date()) - month_index(anchor),
            Frequency::Yearly => i64::from(ws.date().year() - anchor.year()),
            Frequency::Hourly | Frequency::Minutely | Frequency::Secondly => {
                (ws - self.anchor_local).num_seconds() / self.unit_seconds()
            }
        };
        if diff_units <= 0 {
            0
        } else {
            (diff_units / interval) as u64
        }
    }

    fn unit_seconds(&self) -> i64 {
        match self.rule.frequency {
            Frequency::Secondly => 1,
            Frequency::Minutely => 60,
            _ => 3600,
        }
    }

    /// The `k`-th candidate period from the anchor, or `None` once date
    /// arithmetic leaves the supported range.
    fn period(&self, k: u64) -> Option<Period> {
        let steps = (k as i64).checked_mul(i64::from(self.rule.interval.max(1)))?;
        let anchor = self.rule.anchor_date;
        match self.rule.frequency {
            Frequency::Daily => anchor
                .checked_add_signed(Duration::days(steps))
                .map(Period::Day),
            Frequency::Weekly => week_start_of(anchor, self.week_start)
                .checked_add_signed(Duration::days(steps.checked_mul(7)?))
                .map(Period::Week),
            Frequency::Monthly => {
                let index = month_index(anchor).checked_add(steps)?;
                let year = index.div_euclid(12);
                let month = (index.rem_euclid(12) + 1) as u32;
                let year = i32::try_from(year).ok()?;
                NaiveDate::from_ymd_opt(year, month, 1)?;
                Some(Period::Month { year, month })
            }
            Frequency::Yearly => {
                let year = i64::from(anchor.year()).checked_add(steps)?;
                let year = i32::try_from(year).ok()?;
                NaiveDate::from_ymd_opt(year, 1, 1)?;
                Some(Period::Year(year))
            }
            Frequency::Hourly | Frequency::Minutely | Frequency::Secondly => {
                let seconds = steps.checked_mul(self.unit_seconds())?;
                self.anchor_local
                    .checked_add_signed(Duration::seconds(seconds))
                    .map(Period::Instant)
            }
        }
    }

    /// All instants of one period that satisfy the rule, sorted ascending,
    /// with `bySetPos` selection already applied.
    fn period_candidates(&self, period: &Period) -> Vec<NaiveDateTime> {
        let mut candidates = match *period {
            Period::Instant(dt) => {
                if self.day_matches_limits(dt.date()) && self.time_matches(dt.time()) {
                    vec![dt]
                } else {
                    Vec::new()
                }
            }
            Period::Day(day) => {
                if self.day_matches_daily(day) {
                    self.with_times(&[day])
                } else {
                    Vec::new()
                }
            }
            Period::Week(start) => {
                let days: Vec<NaiveDate> = (0..7)
                    .filter_map(|i| start.checked_add_signed(Duration::days(i)))
                    .filter(|d| self.day_matches_weekly(*d))
                    .collect();
                self.with_times(&days)
            }
            Period::Month { year, month } => {
                let days: Vec<NaiveDate> = days_of_month(year, month)
                    .into_iter()
                    .filter(|d| self.day_matches_monthly(*d))
                    .collect();
                self.with_times(&days)
            }
            Period::Year(year) => {
                let days: Vec<NaiveDate> = days_of_year(year)
                    .into_iter()
                    .filter(|d| self.day_matches_yearly(*d))
                    .collect();
                self.with_times(&days)
            }
        };
        candidates = self.apply_set_pos(candidates);
        candidates
    }

    fn with_times(&self, days: &[NaiveDate]) -> Vec<NaiveDateTime> {
        let mut out = Vec::with_capacity(days.len() * self.times.len());
        for day in days {
            for time in &self.times {
                out.push(day.and_time(*time));
            }
        }
        out
    }

    /// Selects the Nth (or Nth-from-end) candidates within one period.
    fn apply_set_pos(&self, candidates: Vec<NaiveDateTime>) -> Vec<NaiveDateTime> {
        let Some(positions) = &self.rule.by_set_pos else {
            return candidates;
        };
        if candidates.is_empty() {
            return candidates;
        }
        let len = candidates.len() as i64;
        let mut selected = Vec::with_capacity(positions.len());
        for &pos in positions {
            let index = if pos > 0 {
                i64::from(pos) - 1
            } else {
                len + i64::from(pos)
            };
            if (0..len).contains(&index) {
                selected.push(candidates[index as usize]);
            }
        }
        selected.sort();
        selected.dedup();
        selected
    }

    fn time_matches(&self, time: NaiveTime) -> bool {
        if let Some(hours) = &self.rule.by_hour {
            if !hours.contains(&(time.hour() as u8)) {
                return false;
            }
        }
        if let Some(minutes) = &self.rule.by_minute {
            if !minutes.contains(&(time.minute() as u8)) {
                return false;
            }
        }
        if let Some(seconds) = &self.rule.by_second {
            if !seconds.contains(&(time.second() as u8)) {
                return false;
            }
        }
        true
    }

    /// Date-level limits shared by daily and sub-daily frequencies.
    fn day_matches_limits(&self, day: NaiveDate) -> bool {
        if let Some(months) = &self.rule.by_month {
            if !months.contains(&(day.month() as u8)) {
                return false;
            }
        }
        if let Some(month_days) = &self.rule.by_month_day {
            if !month_day_matches(day, month_days) {
                return false;
            }
        }
        if let Some(weekdays) = &self.rule.by_week_day {
            let ok = weekdays
                .iter()
                .any(|wd| weekday_num_matches(day, wd, OrdinalScope::Ignored));
            if !ok {
                return false;
            }
        }
        true
    }

    fn day_matches_daily(&self, day: NaiveDate) -> bool {
        self.day_matches_limits(day)
    }

    fn day_matches_weekly(&self, day: NaiveDate) -> bool {
        if let Some(months) = &self.rule.by_month {
            if !months.contains(&(day.month() as u8)) {
                return false;
            }
        }
        if let Some(month_days) = &self.rule.by_month_day {
            if !month_day_matches(day, month_days) {
                return false;
            }
        }
        match &self.rule.by_week_day {
            Some(weekdays) => weekdays
                .iter()
                .any(|wd| weekday_num_matches(day, wd, OrdinalScope::Ignored)),
            None => day.weekday() == self.rule.anchor_date.weekday(),
        }
    }

    fn day_matches_monthly(&self, day: NaiveDate) -> bool {
        let rule = self.rule;
        if let Some(months) = &rule.by_month {
            if !months.contains(&(day.month() as u8)) {
                return false;
            }
        }
        let day_level = rule.by_month_day.is_some() || rule.by_week_day.is_some();
        if !day_level {
            // Plain monthly repeats on the anchor's day-of-month; months
            // without that day (e.g. the 31st) simply yield nothing.
            return day.day() == rule.anchor_date.day();
        }
        if let Some(month_days) = &rule.by_month_day {
            if !month_day_matches(day, month_days) {
                return false;
            }
        }
        if let Some(weekdays) = &rule.by_week_day {
            let ok = weekdays
                .iter()
                .any(|wd| weekday_num_matches(day, wd, OrdinalScope::Month));
            if !ok {
                return false;
            }
        }
        true
    }

    fn day_matches_yearly(&self, day: NaiveDate) -> bool {
        let rule = self.rule;
        if let Some(months) = &rule.by_month {
            if !months.contains(&(day.month() as u8)) {
                return false;
            }
        }
        let day_level = rule.by_month_day.is_some()
            || rule.by_week_day.is_some()
            || rule.by_year_day.is_some()
            || rule.by_week_no.is_some();
        if !day_level {
            return if rule.by_month.is_some() {
                day.day() == rule.anchor_date.day()
            } else {
                day.month() == rule.anchor_date.month() && day.day() == rule.anchor_date.day()
            };
        }
        if let Some(week_numbers) = &rule.by_week_no {
            let total = weeks_in_year(day.year(), self.week_start);
            let (week_year, week) = week_number(day, self.week_start);
            let ok = week_numbers.iter().any(|&w| {
                let target = if w > 0 {
                    i64::from(w)
                } else {
                    total + i64::from(w) + 1
                };
                week_year == day.year() && week == target
            });
            if !ok {
                return false;
            }
        }
        if let Some(year_days) = &rule.by_year_day {
            let length = i64::from(year_length(day.year()));
            let ok = year_days.iter().any(|&yd| {
                let target = if yd > 0 {
                    i64::from(yd)
                } else {
                    length + i64::from(yd) + 1
                };
                i64::from(day.ordinal()) == target
            });
            if !ok {
                return false;
            }
        }
        if let Some(month_days) = &rule.by_month_day {
            if !month_day_matches(day, month_days) {
                return false;
            }
        }
        if let Some(weekdays) = &rule.by_week_day {
            let scope = if rule.by_month.is_some() {
                OrdinalScope::Month
            } else {
                OrdinalScope::Year
            };
            let ok = weekdays
                .iter()
                .any(|wd| weekday_num_matches(day, wd, scope));
            if !ok {
                return false;
            }
        }
        true
    }
}

fn month_day_matches(day: NaiveDate, set: &[i8]) -> bool {
    let length = i64::from(days_in_month(day.year(), day.month()));
    set.iter().any(|&md| {
        let target = if md > 0 {
            i64::from(md)
        } else {
            length + i64::from(md) + 1
        };
        i64::from(day.day()) == target
    })
}

fn weekday_num_matches(day: NaiveDate, constraint: &WeekdayNum, scope: OrdinalScope) -> bool {
    if day.weekday() != constraint.weekday.to_chrono() {
        return false;
    }
    let Some(ordinal) = constraint.ordinal else {
        return true;
    };
    match scope {
        OrdinalScope::Ignored => true,
        OrdinalScope::Month => {
            let from_start = (day.day() - 1) / 7 + 1;
            let from_end = (days_in_month(day.year(), day.month()) - day.day()) / 7 + 1;
            if ordinal > 0 {
                from_start == ordinal as u32
            } else {
                from_end == (-ordinal) as u32
            }
        }
        OrdinalScope::Year => {
            let from_start = (day.ordinal() - 1) / 7 + 1;
            let from_end = (year_length(day.year()) - day.ordinal()) / 7 + 1;
            if ordinal > 0 {
                from_start == ordinal as u32
            } else {
                from_end == (-ordinal) as u32
            }
        }
    }
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
}

fn first_of_year(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MAX)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

fn year_length(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 31).map_or(365, |d| d.ordinal())
}

fn days_of_month(year: i32, month: u32) -> Vec<NaiveDate> {
    (1..=days_in_month(year, month))
        .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .collect()
}

fn days_of_year(year: i32) -> Vec<NaiveDate> {
    (1..=year_length(year))
        .filter_map(|o| NaiveDate::from_yo_opt(year, o))
        .collect()
}

fn days_from_week_start(weekday: chrono::Weekday, week_start: chrono::Weekday) -> i64 {
    let diff = i64::from(weekday.num_days_from_monday())
        - i64::from(week_start.num_days_from_monday());
    diff.rem_euclid(7)
}

fn week_start_of(date: NaiveDate, week_start: chrono::Weekday) -> NaiveDate {
    date - Duration::days(days_from_week_start(date.weekday(), week_start))
}

/// Start of week 1: the first week (aligned to `week_start`) containing at
/// least four days of the year, mirroring the ISO rule.
fn week_one_start(year: i32, week_start: chrono::Weekday) -> NaiveDate {
    let jan_first = first_of_year(year);
    let aligned = week_start_of(jan_first, week_start);
    if (jan_first - aligned).num_days() <= 3 {
        aligned
    } else {
        aligned + Duration::days(7)
    }
}

fn weeks_in_year(year: i32, week_start: chrono::Weekday) -> i64 {
    (week_one_start(year + 1, week_start) - week_one_start(year, week_start)).num_days() / 7
}

/// Week number of a date and the year that week belongs to (a date near a
/// year boundary can fall in the adjacent year's numbering).
fn week_number(date: NaiveDate, week_start: chrono::Weekday) -> (i32, i64) {
    let mut year = date.year();
    let mut start = week_one_start(year, week_start);
    if date < start {
        year -= 1;
        start = week_one_start(year, week_start);
    } else {
        let next = week_one_start(year + 1, week_start);
        if date >= next {
            year += 1;
            start = next;
        }
    }
    (year, (date - start).num_days() / 7 + 1)
}
