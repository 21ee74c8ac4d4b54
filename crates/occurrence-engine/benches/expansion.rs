use std::hint::black_box;

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use occurrence_engine::{
    build_occurrences, generate, parse_rule, AnchorRows, BaseRecurringEntity, ResolvedConfig,
    StandaloneEventRow, TaskRow, TaskStatus, Window,
};

fn far_future_window() -> Window {
    Window::new(
        Utc.with_ymd_and_hms(2150, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2150, 4, 1, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

fn bench_unbounded_daily_far_future(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(1970, 1, 1, 9, 0, 0).unwrap();
    let entity = BaseRecurringEntity::timed(start, None).with_rule(parse_rule(Some("FREQ=DAILY")));
    let window = far_future_window();
    c.bench_function("daily_from_1970_queried_in_2150", |b| {
        b.iter(|| generate(black_box(&entity), black_box(&window)))
    });
}

fn bench_month_of_mixed_rows(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2150, 3, 1, 0, 0, 0).unwrap();
    let rows = AnchorRows {
        events: (0..200)
            .map(|i| StandaloneEventRow {
                id: format!("e-{i}"),
                title: "Event".to_string(),
                description: None,
                start_at: Utc.with_ymd_and_hms(2000 + (i % 50), 1 + (i as u32 % 12), 28, 9, 0, 0)
                    .unwrap(),
                end_at: None,
                is_all_day: i % 3 == 0,
                color: None,
                recurrence_rule: ["FREQ=DAILY", "FREQ=WEEKLY", "FREQ=MONTHLY", "FREQ=YEARLY"]
                    .get(i as usize % 5)
                    .map(|r| r.to_string()),
                recurrence_end_date: None,
            })
            .collect(),
        tasks: (0..200)
            .map(|i| TaskRow {
                id: format!("t-{i}"),
                title: "Task".to_string(),
                description: None,
                deadline: Some(start + chrono::Duration::hours(i64::from(i))),
                status: TaskStatus::Todo,
            })
            .collect(),
        reminders: Vec::new(),
    };
    let window = far_future_window();
    let config = ResolvedConfig::default();
    c.bench_function("merge_400_rows_one_month", |b| {
        b.iter(|| build_occurrences(black_box(&rows), black_box(&window), &config))
    });
}

criterion_group!(
    benches,
    bench_unbounded_daily_far_future,
    bench_month_of_mixed_rows
);
criterion_main!(benches);
