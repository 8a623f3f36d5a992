//! Thread lifecycle core: creation, tracking and teardown of worker threads.
//!
//! Every worker is a named [`Thread`] object registered in a process-wide
//! table. Threads are started on fresh OS threads, report an [`ExitCode`]
//! when they finish, and can be paused at well-defined checkpoints by other
//! threads through a cooperative rendezvous, which is also how shutdown
//! requests are delivered.
//!
//! # Architecture
//!
//! - **Thread / ThreadHandle**: Owning thread object and its shareable handle
//! - **ThreadBody**: User code a thread runs, with optional init/terminate hooks
//! - **Rendezvous**: `sync` checkpoints, `wait_sync`/`release`, shutdown requests
//! - **Registry**: Process-wide name and OS id lookup of thread objects
//! - **current_thread**: Finds the caller's thread object, adopting the main thread
//! - **Guards**: Scoped priority changes and scoped rendezvous
//! - **ThreadBuilder**: Fluent builder pattern for thread construction
//!
//! # Example
//! ```ignore
//! use std::time::Duration;
//! use threadcore::{ExitCode, ThreadBuilder, WAIT_FOREVER};
//!
//! let worker = ThreadBuilder::new("Worker1")
//!     .entry(|thread, _| {
//!         let mut count = 0u32;
//!         while !thread.check_shutdown_request() {
//!             count += 1;
//!             thread.sleep_cancelable(Duration::from_millis(5));
//!         }
//!         Ok(ExitCode::ADMIN_STOP)
//!     })
//!     .build()?;
//!
//! worker.start_default()?;
//! worker.req_shutdown_sync(WAIT_FOREVER)?;
//! assert_eq!(worker.wait_for_death(WAIT_FOREVER)?, ExitCode::ADMIN_STOP);
//! ```

mod builder;
pub mod config;
mod error;
mod exit;
mod native;
mod registry;
mod thread;
mod utils;

pub use builder::ThreadBuilder;
pub use config::WAIT_FOREVER;
pub use error::{Result, ThreadError};
pub use exit::ExitCode;
pub use native::{Priority, ThreadId, ThreadState};
pub use registry::thread_count;
pub use thread::{
    BoxError, FnBody, OnExit, PriorityGuard, RunResult, StartData, SyncGuard, Thread, ThreadBody,
    ThreadFlags, ThreadHandle, current_thread, current_thread_id, make_primary,
    try_current_thread,
};
