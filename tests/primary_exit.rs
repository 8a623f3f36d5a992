//! The process exit status is the primary thread's exit code.
//!
//! Runs without the test harness so that `main` is the process main thread
//! and the worker's exit can end the process.

use std::process;
use std::thread;
use std::time::Duration;

use threadcore::{ExitCode, ThreadBuilder, ThreadError, ThreadFlags, current_thread};

fn main() {
    let _ = env_logger::builder().is_test(true).try_init();

    let main_thread = current_thread();
    assert_eq!(main_thread.name(), "PrimaryThread");
    assert!(main_thread.is_running());
    assert!(current_thread().same_as(&main_thread));
    assert!(matches!(
        main_thread.wait_for_death(Duration::from_millis(1)),
        Err(ThreadError::WaitForSelf(_))
    ));

    let worker = ThreadBuilder::new("PrimaryWorker")
        .entry(|_, _| {
            thread::sleep(Duration::from_millis(50));
            Ok(ExitCode::NORMAL)
        })
        .build()
        .unwrap();

    worker.start(None, ThreadFlags::PRIMARY).unwrap();

    thread::sleep(Duration::from_secs(10));
    eprintln!("primary thread finished without ending the process");
    process::exit(1);
}
