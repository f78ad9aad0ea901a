/*!
 * Schedule Tests
 * Step budgets, retry precedence and delay properties of process schedules
 */

use exec_scheduler::schedule::{
    ChannelListener, Interval, ProcessSchedule, ScheduleEventKind, ScheduleStatus, TimeInterval,
    TimeSchedule,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn every(interval: Interval, ticks: u32) -> TimeSchedule {
    TimeSchedule::new(TimeInterval::new(interval, ticks).unwrap())
}

/// Count the runs a schedule allows: the first run plus every successful reschedule
fn runs_allowed(schedule: &mut ProcessSchedule, cap: u32) -> u32 {
    let mut runs = 0;
    schedule.delay();
    while !schedule.is_done() && runs < cap {
        runs += 1;
        schedule.reschedule(false);
    }
    runs
}

proptest! {
    #[test]
    fn budget_of_n_steps_gives_n_plus_one_runs(max_steps in 0u32..20) {
        let mut schedule = ProcessSchedule::periodic(
            TimeSchedule::new(TimeInterval::immediate()).with_max_steps(max_steps),
        );
        prop_assert_eq!(runs_allowed(&mut schedule, 100), max_steps + 1);
        prop_assert!(schedule.is_done());
    }

    #[test]
    fn delay_is_never_negative(ticks in 1u32..120, steps in 0usize..5) {
        let mut schedule = ProcessSchedule::periodic(every(Interval::Seconds, ticks));
        for _ in 0..steps {
            schedule.reschedule(false);
        }
        let delay = schedule.delay();
        prop_assert!(delay <= Duration::from_secs(u64::from(ticks) * (steps as u64 + 1)));
    }

    #[test]
    fn retry_must_be_shorter(periodic in 1u32..10, retry in 1u32..10) {
        let result = ProcessSchedule::new(
            Some(every(Interval::Minutes, periodic)),
            Some(every(Interval::Minutes, retry)),
        );
        prop_assert_eq!(result.is_ok(), retry < periodic);
    }
}

#[test]
fn test_retry_takes_precedence_until_budget_spent() {
    let mut schedule = ProcessSchedule::new(
        Some(every(Interval::Hours, 1)),
        Some(every(Interval::Minutes, 5).with_max_steps(2)),
    )
    .unwrap();
    let (listener, events) = ChannelListener::unbounded();
    schedule.add_listener(Arc::new(listener));

    let start = schedule.scheduled_time().unwrap();
    let first_retry = schedule.reschedule(true).unwrap();
    // a retry step leaves the periodic budget alone
    assert_eq!(schedule.periodic_spec().unwrap().steps_taken(), 0);
    assert_eq!(schedule.retry_spec().unwrap().steps_taken(), 1);

    let second_retry = schedule.reschedule(true).unwrap();
    let periodic = schedule.reschedule(true).unwrap();
    assert_eq!(schedule.periodic_spec().unwrap().steps_taken(), 1);
    assert_eq!(schedule.retry_spec().unwrap().steps_taken(), 0);

    // the periodic step refilled the retry budget
    assert!(schedule.reschedule(true).is_some());
    assert_eq!(schedule.periodic_spec().unwrap().steps_taken(), 1);
    assert_eq!(schedule.retry_spec().unwrap().steps_taken(), 1);

    // retries step from the current minute, not from the periodic anchor
    assert!(first_retry > start);
    assert!(first_retry - start <= time::Duration::minutes(65));
    assert_eq!(second_retry - first_retry, time::Duration::minutes(5));
    assert_eq!(periodic - start, time::Duration::hours(1));

    let statuses: Vec<ScheduleStatus> = events.try_iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            ScheduleStatus::Started,
            ScheduleStatus::Retried,
            ScheduleStatus::Retried,
            ScheduleStatus::Periodic,
            ScheduleStatus::Retried,
        ]
    );
}

#[test]
fn test_stop_and_restart_emit_events() {
    let mut schedule = ProcessSchedule::periodic(every(Interval::Minutes, 10));
    let (listener, events) = ChannelListener::unbounded();
    schedule.add_listener(Arc::new(listener));

    schedule.delay();
    schedule.stop();
    assert!(schedule.is_done());
    // stopping twice emits once
    schedule.stop();
    schedule.restart().unwrap();
    assert!(!schedule.is_done());

    let kinds: Vec<ScheduleEventKind> = events.try_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ScheduleEventKind::Started,
            ScheduleEventKind::Completed,
            ScheduleEventKind::Started,
        ]
    );
}

#[test]
fn test_execute_now_keeps_counters() {
    let mut schedule = ProcessSchedule::periodic(
        TimeSchedule::new(TimeInterval::new(Interval::Days, 1).unwrap()).with_max_steps(1),
    );
    schedule.delay();
    schedule.reschedule(false);
    assert!(schedule.delay() > Duration::ZERO);

    schedule.execute_now();
    assert_eq!(schedule.delay(), Duration::ZERO);
    // the single step was already used
    schedule.reschedule(false);
    assert!(schedule.is_done());
}
