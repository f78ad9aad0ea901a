/*!
 * Sync Scheduler Tests
 * Queue order, single execution and post-execute maintenance runs
 */

use exec_scheduler::schedule::{ProcessSchedule, TimeInterval, TimeSchedule};
use exec_scheduler::{
    ExecStatus, OnCount, OnQueueEmpty, ProcessScheduler, QueueKind, ScheduledProcess,
    SchedulerConfig, SyncScheduler,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

fn recording(name: &str, order: Arc<Mutex<Vec<String>>>) -> Arc<ScheduledProcess> {
    let label = name.to_string();
    ScheduledProcess::builder(name)
        .body(move |_| {
            order.lock().push(label.clone());
            Ok(())
        })
        .build()
        .unwrap()
}

/// Body that blocks until `gate` opens, so later submissions pile up in the queue
fn gated(name: &str, gate: Arc<AtomicUsize>) -> Arc<ScheduledProcess> {
    ScheduledProcess::builder(name)
        .body(move |_| {
            wait_for(Duration::from_secs(5), || gate.load(Ordering::SeqCst) > 0);
            Ok(())
        })
        .build()
        .unwrap()
}

#[test]
fn test_fifo_runs_in_submission_order() {
    let scheduler = SyncScheduler::new();
    scheduler.start().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        assert!(scheduler.submit(&recording(name, order.clone())));
    }
    scheduler.stop(false);
    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    assert_eq!(scheduler.processed_count(), 3);
}

#[test]
fn test_lifo_runs_latest_first() {
    let config = SchedulerConfig {
        queue: QueueKind::Lifo,
        ..SchedulerConfig::sequential()
    };
    let scheduler = SyncScheduler::with_config(&config);
    scheduler.start().unwrap();

    let gate = Arc::new(AtomicUsize::new(0));
    let blocker = gated("blocker", gate.clone());
    assert!(scheduler.submit(&blocker));
    assert!(wait_for(Duration::from_secs(5), || {
        scheduler.status(&blocker) == ExecStatus::Executing
    }));

    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["a", "b", "c"] {
        assert!(scheduler.submit(&recording(name, order.clone())));
    }
    assert_eq!(scheduler.queued_count(), 3);
    assert_eq!(scheduler.executing_count(), 1);
    gate.store(1, Ordering::SeqCst);

    scheduler.stop(false);
    assert_eq!(*order.lock(), vec!["c", "b", "a"]);
}

#[test]
fn test_periodic_process_runs_once() {
    let scheduler = SyncScheduler::new();
    scheduler.start().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let process = {
        let runs = runs.clone();
        ScheduledProcess::builder("not-repeated")
            .with_schedule(ProcessSchedule::periodic(TimeSchedule::new(
                TimeInterval::immediate(),
            )))
            .body(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap()
    };
    assert!(scheduler.submit(&process));
    assert!(wait_for(Duration::from_secs(5), || scheduler.completed_count() == 1));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.status(&process), ExecStatus::Completed);
    scheduler.stop(false);
}

#[test]
fn test_post_task_fires_every_second_run() {
    let scheduler = SyncScheduler::new();
    let maintenance_runs = Arc::new(AtomicUsize::new(0));
    let maintenance = {
        let maintenance_runs = maintenance_runs.clone();
        ScheduledProcess::builder("maintenance")
            .body(move |_| {
                assert_eq!(
                    thread::current().name(),
                    Some("exec-post-execute"),
                    "post task runs on its own thread"
                );
                maintenance_runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap()
    };
    scheduler
        .set_post_execute_task(Some(maintenance), Some(Box::new(OnCount::new(2))))
        .unwrap();
    scheduler.start().unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..4 {
        assert!(scheduler.submit(&recording(&format!("job-{i}"), order.clone())));
    }
    assert!(wait_for(Duration::from_secs(5), || scheduler.completed_count() == 4));
    assert!(wait_for(Duration::from_secs(5), || maintenance_runs.load(Ordering::SeqCst) == 2));

    // once more on shutdown
    scheduler.stop(false);
    assert_eq!(maintenance_runs.load(Ordering::SeqCst), 3);
}

#[test]
fn test_post_task_on_empty_queue() {
    let scheduler = SyncScheduler::new();
    let maintenance_runs = Arc::new(AtomicUsize::new(0));
    let maintenance = {
        let maintenance_runs = maintenance_runs.clone();
        ScheduledProcess::builder("cleanup")
            .body(move |_| {
                maintenance_runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap()
    };
    scheduler
        .set_post_execute_task(Some(maintenance), Some(Box::new(OnQueueEmpty)))
        .unwrap();
    scheduler.start().unwrap();

    let gate = Arc::new(AtomicUsize::new(0));
    assert!(scheduler.submit(&gated("blocker", gate.clone())));
    let order = Arc::new(Mutex::new(Vec::new()));
    assert!(scheduler.submit(&recording("queued", order.clone())));
    gate.store(1, Ordering::SeqCst);

    assert!(wait_for(Duration::from_secs(5), || scheduler.completed_count() == 2));
    assert!(wait_for(Duration::from_secs(5), || maintenance_runs.load(Ordering::SeqCst) >= 1));
    assert_eq!(maintenance_runs.load(Ordering::SeqCst), 1);
    scheduler.stop(true);
}

#[test]
fn test_failed_post_task_is_logged() {
    let scheduler = SyncScheduler::new();
    let maintenance = ScheduledProcess::builder("broken-cleanup")
        .body(|_| anyhow::bail!("disk full"))
        .build()
        .unwrap();
    scheduler
        .set_post_execute_task(Some(maintenance.clone()), Some(Box::new(OnQueueEmpty)))
        .unwrap();
    scheduler.start().unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    assert!(scheduler.submit(&recording("job", order.clone())));
    let logger = scheduler.logger().clone();
    assert!(wait_for(Duration::from_secs(5), || {
        logger
            .archived_entries(&*maintenance)
            .iter()
            .any(|e| e.message == "Post Exec Task Failed: disk full")
    }));
    scheduler.stop(false);
}
