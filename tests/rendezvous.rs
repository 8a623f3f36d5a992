use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use threadcore::{
    ExitCode, SyncGuard, Thread, ThreadBuilder, ThreadError, WAIT_FOREVER,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A worker that bumps `counter` between checkpoints as fast as it can.
fn counting_worker(name: &str, counter: Arc<AtomicU64>) -> Thread {
    ThreadBuilder::new(name)
        .entry(move |thread, _| {
            while !thread.check_shutdown_request() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(ExitCode::ADMIN_STOP)
        })
        .build()
        .unwrap()
}

#[test]
fn test_counter_frozen_while_synced() {
    init_logger();
    let counter = Arc::new(AtomicU64::new(0));
    let worker = counting_worker("Counter", counter.clone());
    worker.start_default().unwrap();

    for _ in 0..200 {
        worker.wait_sync(Duration::from_secs(5)).unwrap();

        let before = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_micros(200));
        assert_eq!(counter.load(Ordering::SeqCst), before);

        worker.release().unwrap();
    }

    worker.req_shutdown_sync(WAIT_FOREVER).unwrap();
    assert_eq!(worker.wait_for_death(WAIT_FOREVER).unwrap(), ExitCode::ADMIN_STOP);
}

#[test]
fn test_one_requester_at_a_time() {
    init_logger();
    let counter = Arc::new(AtomicU64::new(0));
    let worker = counting_worker("Contended", counter);
    worker.start_default().unwrap();

    worker.wait_sync(Duration::from_secs(5)).unwrap();

    let other = worker.handle().clone();
    let (second, stray) = thread::spawn(move || {
        let second = other.wait_sync(Duration::from_millis(50));
        let stray = other.release();
        (second, stray)
    })
    .join()
    .unwrap();

    assert!(matches!(second, Err(ThreadError::AlreadySynced { .. })));
    assert!(matches!(stray, Err(ThreadError::NotSyncRequester(_))));

    // The rejected calls left the rendezvous with its owner.
    worker.release().unwrap();
    worker.wait_sync(Duration::from_secs(5)).unwrap();
    worker.release().unwrap();

    worker.req_shutdown_sync(WAIT_FOREVER).unwrap();
    worker.wait_for_death(WAIT_FOREVER).unwrap();
}

#[test]
fn test_guard_releases_on_drop() {
    init_logger();
    let counter = Arc::new(AtomicU64::new(0));
    let worker = counting_worker("Guarded", counter.clone());
    worker.start_default().unwrap();

    let frozen = {
        let _guard = SyncGuard::new(&worker, Duration::from_secs(5)).unwrap();
        let value = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(counter.load(Ordering::SeqCst), value);
        value
    };

    while counter.load(Ordering::SeqCst) == frozen {
        thread::yield_now();
    }

    worker.req_shutdown_sync(WAIT_FOREVER).unwrap();
    worker.wait_for_death(WAIT_FOREVER).unwrap();
}

#[test]
fn test_sync_only_from_the_thread_itself() {
    init_logger();
    let worker = counting_worker("SyncOwner", Arc::new(AtomicU64::new(0)));

    let err = worker.sync().unwrap_err();
    assert!(matches!(err, ThreadError::NotThisThread { op: "sync", .. }));
}

#[test]
fn test_wait_sync_on_stopped_thread() {
    init_logger();
    let worker = counting_worker("Stopped", Arc::new(AtomicU64::new(0)));

    let err = worker.wait_sync(Duration::from_millis(10)).unwrap_err();
    assert!(matches!(err, ThreadError::NotRunning(_)));

    // Nothing to release; only logged.
    assert!(worker.release().is_ok());
}

#[test]
fn test_target_dies_during_wait_sync() {
    init_logger();
    let worker = ThreadBuilder::new("DiesEarly")
        .entry(|_, _| {
            // Never reaches another checkpoint.
            thread::sleep(Duration::from_millis(50));
            Ok(ExitCode(5))
        })
        .build()
        .unwrap();
    worker.start_default().unwrap();

    let err = worker.wait_sync(WAIT_FOREVER).unwrap_err();

    assert!(matches!(err, ThreadError::NotRunning(_)));
    assert_eq!(worker.wait_for_death(WAIT_FOREVER).unwrap(), ExitCode(5));
}

#[test]
fn test_target_dies_right_after_release() {
    init_logger();
    let doomed = Arc::new(AtomicBool::new(false));
    let flag = doomed.clone();

    let worker = ThreadBuilder::new("DiesOnRelease")
        .entry(move |thread, _| {
            loop {
                thread.sync()?;
                if flag.load(Ordering::SeqCst) {
                    panic!("gone right after the checkpoint");
                }
                thread::yield_now();
            }
        })
        .on_exit(|_, _| thread::sleep(Duration::from_millis(20)))
        .build()
        .unwrap();
    worker.start_default().unwrap();

    worker.wait_sync(Duration::from_secs(5)).unwrap();
    doomed.store(true, Ordering::SeqCst);

    let released = Instant::now();
    worker.release().unwrap();
    assert!(released.elapsed() < Duration::from_secs(2));

    assert_eq!(worker.wait_for_death(WAIT_FOREVER).unwrap(), ExitCode::RUNTIME_ERROR);
    assert!(worker.release().is_ok());
}

#[test]
fn test_wait_sync_timeout_leaves_thread_usable() {
    init_logger();
    let worker = ThreadBuilder::new("LateCheckpoint")
        .entry(|thread, _| {
            thread::sleep(Duration::from_millis(200));
            while thread.sleep_cancelable(Duration::from_millis(5)) {}
            Ok(ExitCode::ADMIN_STOP)
        })
        .build()
        .unwrap();
    worker.start_default().unwrap();

    let err = worker.wait_sync(Duration::from_millis(20)).unwrap_err();
    assert!(err.is_timeout());

    // The abandoned request must not pause the thread later on.
    worker.wait_sync(Duration::from_secs(5)).unwrap();
    worker.release().unwrap();

    worker.req_shutdown_sync(WAIT_FOREVER).unwrap();
    assert_eq!(worker.wait_for_death(WAIT_FOREVER).unwrap(), ExitCode::ADMIN_STOP);
}
