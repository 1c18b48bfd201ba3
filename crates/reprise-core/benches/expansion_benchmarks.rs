use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reprise_core::expand::{expand, occurrences_before};
use reprise_core::rule::{EndCondition, Frequency, RecurrenceRule, Weekday, WeekdayNum};

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

fn nine_am() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn window_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn bench_daily_expansion(c: &mut Criterion) {
    let rule = RecurrenceRule::new(Frequency::Daily, anchor(), "UTC");
    let start = window_start();

    let mut group = c.benchmark_group("daily_expansion");
    for days in [7, 30, 90, 365].iter() {
        let end = start + Duration::days(*days);
        group.bench_with_input(BenchmarkId::new("days", days), days, |b, _| {
            b.iter(|| expand(black_box(&rule), nine_am(), black_box(start), black_box(end)).unwrap())
        });
    }
    group.finish();
}

fn bench_constrained_rules(c: &mut Criterion) {
    let start = window_start();
    let end = start + Duration::days(365);

    let mut weekday_rule = RecurrenceRule::new(Frequency::Weekly, anchor(), "UTC");
    weekday_rule.by_week_day = Some(vec![
        WeekdayNum::every(Weekday::Monday),
        WeekdayNum::every(Weekday::Wednesday),
        WeekdayNum::every(Weekday::Friday),
    ]);

    let mut last_friday = RecurrenceRule::new(Frequency::Monthly, anchor(), "UTC");
    last_friday.by_week_day = Some(vec![WeekdayNum::every(Weekday::Friday)]);
    last_friday.by_set_pos = Some(vec![-1]);

    let mut yearly_weeks = RecurrenceRule::new(Frequency::Yearly, anchor(), "UTC");
    yearly_weeks.by_week_no = Some(vec![1, 26, -1]);
    yearly_weeks.by_week_day = Some(vec![WeekdayNum::every(Weekday::Monday)]);

    let mut group = c.benchmark_group("constrained_rules");
    for (name, rule) in [
        ("weekly_mo_we_fr", &weekday_rule),
        ("monthly_last_friday", &last_friday),
        ("yearly_by_week_no", &yearly_weeks),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| expand(black_box(rule), nine_am(), black_box(start), black_box(end)).unwrap())
        });
    }
    group.finish();
}

fn bench_count_rule_far_window(c: &mut Criterion) {
    // A Count-bounded series queried years past its anchor exercises the
    // pre-window counting path
    let mut rule = RecurrenceRule::new(Frequency::Daily, anchor(), "UTC");
    rule.end_condition = EndCondition::Count { count: 2000 };
    let start = window_start() + Duration::days(1800);
    let end = start + Duration::days(90);

    c.bench_function("count_rule_far_window", |b| {
        b.iter(|| expand(black_box(&rule), nine_am(), black_box(start), black_box(end)).unwrap())
    });
}

fn bench_occurrences_before(c: &mut Criterion) {
    let mut rule = RecurrenceRule::new(Frequency::Weekly, anchor(), "UTC");
    rule.by_week_day = Some(vec![
        WeekdayNum::every(Weekday::Monday),
        WeekdayNum::every(Weekday::Thursday),
    ]);
    let before = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();

    c.bench_function("occurrences_before_five_years", |b| {
        b.iter(|| occurrences_before(black_box(&rule), nine_am(), black_box(before)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_daily_expansion,
    bench_constrained_rules,
    bench_count_rule_far_window,
    bench_occurrences_before
);
criterion_main!(benches);
