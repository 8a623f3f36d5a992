//! "Which thread object am I?"
//!
//! Threads started by this crate are found through the registry by OS id.
//! The process main thread was not started by us; the first time it asks,
//! it is adopted under the name `PrimaryThread` and stays registered for
//! the rest of the process. Any other thread that asks without being
//! registered is a programming error severe enough to end the process.

use crate::config::PRIMARY_THREAD_NAME;
use crate::error::{Result, ThreadError};
use crate::exit;
use crate::native::event::ThreadState;
use crate::native::thread::is_process_main;
use crate::native::{ThreadId, current_id};
use crate::registry::{REGISTRY, Registry};
use crate::thread::core::{Inner, Thread, ThreadHandle};

use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Returns the thread object of the calling thread.
///
/// Terminates the process if the caller is neither a thread started by
/// this crate nor the process main thread.
///
/// # Example
/// ```ignore
/// fn main() {
///     let me = current_thread();
///     assert_eq!(me.name(), "PrimaryThread");
/// }
/// ```
pub fn current_thread() -> ThreadHandle {
    match try_current_thread() {
        Some(thread) => thread,
        // The logger may itself depend on the registry, so no `log` here.
        None => exit::fatal(&format!(
            "thread {} ({}) is not registered",
            current_id(),
            std::thread::current().name().unwrap_or("<unnamed>")
        )),
    }
}

/// Non-fatal form of [`current_thread`].
pub fn try_current_thread() -> Option<ThreadHandle> {
    let tid = current_id();
    let mut registry = REGISTRY.lock();

    if let Some(inner) = registry.find_by_id(tid) {
        return Some(ThreadHandle::from_inner(inner));
    }

    if registry.has_adopted() || !is_process_main() {
        return None;
    }

    adopt_main(&mut registry, tid).map(ThreadHandle::from_inner)
}

/// OS id of the calling thread.
pub fn current_thread_id() -> ThreadId {
    current_id()
}

fn adopt_main(registry: &mut Registry<Inner>, tid: ThreadId) -> Option<Arc<Inner>> {
    let inner = Arc::new(Inner::new(PRIMARY_THREAD_NAME, None, 0, true));

    if registry
        .register(PRIMARY_THREAD_NAME, Arc::downgrade(&inner))
        .is_err()
    {
        return None;
    }

    inner.attach_caller();
    inner.signals.set_state(ThreadState::Running);

    if registry
        .attach(PRIMARY_THREAD_NAME, tid, Arc::downgrade(&inner))
        .is_err()
    {
        return None;
    }

    registry.set_adopted(inner.clone());
    Some(inner)
}

/// Makes `thread` the primary thread: when it ends, the process exits with
/// its exit code.
///
/// # Returns
/// `PrimaryAlreadySet` if a different, still existing thread is primary.
pub fn make_primary(thread: &Thread) -> Result<()> {
    let inner = &thread.handle().inner;
    let mut registry = REGISTRY.lock();

    if let Some(current) = registry.primary() {
        if !Arc::ptr_eq(&current, inner) {
            return Err(ThreadError::PrimaryAlreadySet(current.name.clone()));
        }
    }

    registry.set_primary(inner);
    inner.primary.store(true, Ordering::SeqCst);
    log::debug!("thread '{}' is now the primary thread", inner.name);

    Ok(())
}

/// Drops `inner` as primary thread after a start that did not go through.
pub(crate) fn clear_primary(inner: &Arc<Inner>) {
    let mut registry = REGISTRY.lock();

    if registry.clear_primary(inner) {
        inner.primary.store(false, Ordering::SeqCst);
        log::debug!("thread '{}' is no longer the primary thread", inner.name);
    }
}
