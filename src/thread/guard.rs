//! Scoped helpers that undo themselves on drop.

use crate::error::{Result, ThreadError};
use crate::native::Priority;
use crate::native::priority;
use crate::native::thread::OsThread;
use crate::thread::core::ThreadHandle;

use std::time::Duration;

/// Temporarily changes the calling thread's priority.
///
/// Works on any thread, registered or not. The previous level is restored
/// when the guard is dropped.
///
/// # Example
/// ```ignore
/// {
///     let _low = PriorityGuard::new(Priority::Lowest)?;
///     compact_logs();
/// }
/// // back to the previous priority
/// ```
pub struct PriorityGuard {
    os: OsThread,
    previous: Priority,
}

impl PriorityGuard {
    pub fn new(level: Priority) -> Result<PriorityGuard> {
        let os = OsThread::caller();
        let previous = priority::get(&os).map_err(|source| platform_error("get_priority", source))?;

        priority::set(&os, level).map_err(|source| platform_error("set_priority", source))?;

        Ok(PriorityGuard { os, previous })
    }

    pub fn previous(&self) -> Priority {
        self.previous
    }
}

impl Drop for PriorityGuard {
    fn drop(&mut self) {
        if let Err(err) = priority::set(&self.os, self.previous) {
            log::error!("failed to restore priority {:?}: {}", self.previous, err);
        }
    }
}

fn platform_error(op: &'static str, source: std::io::Error) -> ThreadError {
    ThreadError::Platform {
        name: std::thread::current()
            .name()
            .unwrap_or("<unnamed>")
            .to_string(),
        op,
        source,
    }
}

/// Holds another thread paused for as long as the guard lives.
///
/// Construction performs [`ThreadHandle::wait_sync`]; dropping the guard
/// releases the thread.
pub struct SyncGuard<'a> {
    thread: &'a ThreadHandle,
}

impl<'a> SyncGuard<'a> {
    pub fn new(thread: &'a ThreadHandle, timeout: Duration) -> Result<SyncGuard<'a>> {
        thread.wait_sync(timeout)?;
        Ok(SyncGuard { thread })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.thread.release() {
            log::error!("failed to release thread '{}': {}", self.thread.name(), err);
        }
    }
}
