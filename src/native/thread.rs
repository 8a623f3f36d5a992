//! The OS thread primitive.
//!
//! [`NativeThread`] wraps one OS thread: it spawns it through
//! `std::thread::Builder` (for naming and stack size), remembers the OS
//! identity the new thread reports once it is running, and forwards priority
//! queries to [`crate::native::priority`]. Liveness and exit codes are not
//! tracked here; those live in the owning thread object's signals.

use crate::native::priority::{self, Priority};

use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};

/// Process-wide identifier of an OS thread.
///
/// Derived from `pthread_self`, so it is only unique among threads that are
/// alive at the same time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn from_u64(raw: u64) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Returns the id of the calling OS thread.
pub fn current_id() -> ThreadId {
    ThreadId(unsafe { libc::pthread_self() } as usize as u64)
}

/// True if the caller is the thread the OS created the process with.
#[cfg(target_os = "linux")]
pub(crate) fn is_process_main() -> bool {
    let tid = unsafe { libc::syscall(libc::SYS_gettid) } as libc::pid_t;
    tid == unsafe { libc::getpid() }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) fn is_process_main() -> bool {
    unsafe { libc::pthread_main_np() != 0 }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
pub(crate) fn is_process_main() -> bool {
    thread::current().name() == Some("main")
}

/// OS handles of a running thread, captured on the thread itself.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OsThread {
    // Kept as an integer so the handle stays `Send` where `pthread_t` is a
    // pointer.
    pthread: usize,
    #[cfg(target_os = "linux")]
    pub(crate) kernel_tid: libc::pid_t,
}

impl OsThread {
    pub(crate) fn caller() -> Self {
        Self {
            pthread: unsafe { libc::pthread_self() } as usize,
            #[cfg(target_os = "linux")]
            kernel_tid: unsafe { libc::syscall(libc::SYS_gettid) } as libc::pid_t,
        }
    }

    pub(crate) fn pthread(&self) -> libc::pthread_t {
        self.pthread as libc::pthread_t
    }
}

/// One OS thread, started or adopted.
pub(crate) struct NativeThread {
    join: Option<JoinHandle<()>>,
    os: Option<OsThread>,
    gui: bool,
}

impl NativeThread {
    pub(crate) fn new() -> Self {
        Self {
            join: None,
            os: None,
            gui: false,
        }
    }

    /// Spawns a new OS thread running `entry`.
    ///
    /// The join handle of any previous OS thread must have been taken with
    /// [`take_join`](Self::take_join) first.
    ///
    /// # Arguments
    /// * `name` - OS-visible thread name
    /// * `stack_size` - Stack size in bytes, zero for the platform default
    /// * `entry` - Closure executed on the new thread
    pub(crate) fn begin<F>(&mut self, name: &str, stack_size: usize, entry: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder = thread::Builder::new().name(name.to_string());
        if stack_size != 0 {
            builder = builder.stack_size(stack_size);
        }

        self.join = Some(builder.spawn(entry)?);

        Ok(())
    }

    /// Records the calling thread as this object's OS thread.
    ///
    /// Called by the trampoline on the new thread, and when adopting the
    /// process main thread.
    pub(crate) fn attach_caller(&mut self) -> ThreadId {
        self.os = Some(OsThread::caller());
        current_id()
    }

    /// Forgets the OS identity once the thread has finished.
    pub(crate) fn detach(&mut self) {
        self.os = None;
    }

    /// Hands out the join handle of the last spawned OS thread.
    ///
    /// The caller joins it after letting go of this object's lock, since the
    /// exiting thread may still need that lock on its way out.
    pub(crate) fn take_join(&mut self) -> Option<JoinHandle<()>> {
        self.join.take()
    }

    pub(crate) fn priority(&self) -> io::Result<Priority> {
        priority::get(self.os_thread()?)
    }

    pub(crate) fn set_priority(&self, level: Priority) -> io::Result<()> {
        priority::set(self.os_thread()?, level)
    }

    pub(crate) fn mark_gui(&mut self) {
        self.gui = true;
    }

    pub(crate) fn is_gui(&self) -> bool {
        self.gui
    }

    fn os_thread(&self) -> io::Result<&OsThread> {
        self.os
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "thread is not running"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_differ_between_threads() {
        let here = current_id();
        let there = thread::spawn(current_id).join().unwrap();

        assert_ne!(here, there);
        assert_eq!(here, current_id());
    }

    #[test]
    fn test_test_threads_are_not_process_main() {
        let spawned = thread::spawn(is_process_main).join().unwrap();
        assert!(!spawned);
    }

    #[test]
    fn test_begin_runs_entry_with_name() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut native = NativeThread::new();

        native
            .begin("native-begin", 0, move || {
                let name = thread::current().name().map(str::to_string);
                tx.send(name).unwrap();
            })
            .unwrap();

        assert_eq!(rx.recv().unwrap().as_deref(), Some("native-begin"));
        native.take_join().unwrap().join().unwrap();
        assert!(native.take_join().is_none());
    }
}
