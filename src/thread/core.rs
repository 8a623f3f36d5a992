//! The thread control block.
//!
//! A [`Thread`] is the owning object for one worker: it is constructed with
//! a unique name and a body, started (and restarted) on fresh OS threads,
//! and shut down cooperatively when dropped. Everything other code needs to
//! talk to the worker goes through a [`ThreadHandle`], a cheap shared
//! reference the `Thread` dereferences to and which is also what the body
//! itself receives.
//!
//! # Ownership
//!
//! ```text
//! Thread (owner, one per worker)
//!   └── ThreadHandle ── Arc<Inner> ──┬── Signals (events + lifecycle state)
//!                                    ├── NativeThread (OS handle)
//!                                    └── body / on-exit callback
//! REGISTRY slot ── Weak<Inner>
//! ```
//!
//! Dropping the `Thread` removes the registry slot. Handles that outlive it
//! stay usable but can no longer be found by name or OS id.

use crate::config::{DROP_TIMEOUT, MIN_STACK_SIZE, START_TIMEOUT};
use crate::error::{Result, ThreadError};
use crate::exit::ExitCode;
use crate::native::event::{Event, Signals, ThreadState, WaitOutcome};
use crate::native::thread::NativeThread;
use crate::native::{Priority, ThreadId, current_id};
use crate::registry::REGISTRY;
use crate::thread::body::{OnExit, StartData, ThreadBody};
use crate::thread::current;
use crate::thread::rendezvous::RendezvousState;
use crate::thread::trampoline;

use bitflags::bitflags;
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

bitflags! {
    /// Options applied when a thread is started.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ThreadFlags: u32 {
        /// Mark the thread as a GUI thread.
        const GUI = 1 << 0;
        /// Make the thread the primary thread: its exit code ends the process.
        const PRIMARY = 1 << 1;
    }
}

pub(crate) struct Inner {
    pub(crate) name: String,
    pub(crate) stack_size: usize,
    pub(crate) self_priority: bool,
    pub(crate) shutdown: AtomicBool,
    pub(crate) primary: AtomicBool,
    pub(crate) rendezvous: AtomicU8,
    /// Raw id of the rendezvous requester, zero when there is none.
    pub(crate) requester: AtomicU64,
    /// Raw OS id while the thread runs, zero otherwise.
    os_id: AtomicU64,
    pub(crate) signals: Signals,
    pub(crate) native: Mutex<NativeThread>,
    pub(crate) body: Mutex<Option<Box<dyn ThreadBody>>>,
    pub(crate) on_exit: Mutex<Option<OnExit>>,
}

impl Inner {
    pub(crate) fn new(
        name: &str,
        body: Option<Box<dyn ThreadBody>>,
        stack_size: usize,
        self_priority: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            stack_size: normalize_stack_size(stack_size),
            self_priority,
            shutdown: AtomicBool::new(false),
            primary: AtomicBool::new(false),
            rendezvous: AtomicU8::new(RendezvousState::Idle as u8),
            requester: AtomicU64::new(0),
            os_id: AtomicU64::new(0),
            signals: Signals::new(),
            native: Mutex::new(NativeThread::new()),
            body: Mutex::new(body),
            on_exit: Mutex::new(None),
        }
    }

    /// Binds the calling OS thread to this object.
    pub(crate) fn attach_caller(&self) -> ThreadId {
        let tid = self.native.lock().attach_caller();
        self.os_id.store(tid.as_u64(), Ordering::Release);

        tid
    }

    pub(crate) fn detach_caller(&self) {
        self.os_id.store(0, Ordering::Release);
        self.native.lock().detach();
    }

    pub(crate) fn tid(&self) -> Option<ThreadId> {
        ThreadId::from_u64(self.os_id.load(Ordering::Acquire))
    }

    /// True if the caller is this object's OS thread. Lock-free.
    pub(crate) fn is_caller(&self) -> bool {
        self.tid() == Some(current_id())
    }
}

/// Explicit stack sizes are raised to the minimum; zero keeps the default.
pub(crate) fn normalize_stack_size(stack_size: usize) -> usize {
    if stack_size == 0 {
        0
    } else {
        stack_size.max(MIN_STACK_SIZE)
    }
}

/// Shared reference to a thread object.
///
/// Handles are cheap to clone and can be sent to other threads. The body of
/// a thread receives its own handle, which is how it takes rendezvous
/// checkpoints and polls for shutdown requests.
#[derive(Clone)]
pub struct ThreadHandle {
    pub(crate) inner: Arc<Inner>,
}

impl ThreadHandle {
    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Looks up a registered thread by name.
    pub fn find(name: &str) -> Option<ThreadHandle> {
        REGISTRY.lock().find_by_name(name).map(Self::from_inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// OS id of the running thread, `None` before start and after exit.
    pub fn tid(&self) -> Option<ThreadId> {
        self.inner.tid()
    }

    pub fn state(&self) -> ThreadState {
        self.inner.signals.state()
    }

    /// True from `start` until the thread has published its death.
    pub fn is_running(&self) -> bool {
        self.state().is_alive()
    }

    /// Exit code of the last completed run.
    pub fn exit_code(&self) -> Option<ExitCode> {
        if self.is_running() {
            return None;
        }

        self.inner.signals.exit_code()
    }

    /// Waits for the thread to finish and returns its exit code.
    ///
    /// # Arguments
    /// * `timeout` - How long to wait, [`WAIT_FOREVER`](crate::config::WAIT_FOREVER) for no limit
    ///
    /// # Returns
    /// The exit code, `NotRunning` if the thread was never started,
    /// `WaitForSelf` when called from the thread itself, or `Timeout`.
    pub fn wait_for_death(&self, timeout: Duration) -> Result<ExitCode> {
        if self.inner.is_caller() {
            return Err(ThreadError::WaitForSelf(self.inner.name.clone()));
        }

        match self.inner.signals.wait_for_death(timeout) {
            Some(Some(code)) => Ok(code),
            Some(None) => Err(ThreadError::NotRunning(self.inner.name.clone())),
            None => Err(ThreadError::Timeout {
                name: self.inner.name.clone(),
                op: "wait_for_death",
            }),
        }
    }

    /// Boolean form of [`wait_for_death`](Self::wait_for_death).
    ///
    /// True once no OS thread is attached, including a thread that never ran.
    pub fn try_wait_for_death(&self, timeout: Duration) -> bool {
        if self.inner.is_caller() {
            log::warn!("thread '{}' tried to wait for its own death", self.inner.name);
            return false;
        }

        self.inner.signals.wait_for_death(timeout).is_some()
    }

    pub fn priority(&self) -> Result<Priority> {
        self.inner
            .native
            .lock()
            .priority()
            .map_err(|source| ThreadError::Platform {
                name: self.inner.name.clone(),
                op: "get_priority",
                source,
            })
    }

    /// Changes the scheduling priority of the thread.
    ///
    /// A thread constructed with self-priority only accepts this call from
    /// itself.
    pub fn set_priority(&self, level: Priority) -> Result<()> {
        if self.inner.self_priority && !self.inner.is_caller() {
            return Err(ThreadError::NotThisThread {
                name: self.inner.name.clone(),
                op: "set_priority",
            });
        }

        self.inner
            .native
            .lock()
            .set_priority(level)
            .map_err(|source| ThreadError::Platform {
                name: self.inner.name.clone(),
                op: "set_priority",
                source,
            })
    }

    /// Parks the calling thread until another thread calls [`unblock`](Self::unblock).
    pub fn block_myself(&self) -> Result<()> {
        if !self.inner.is_caller() {
            return Err(ThreadError::NotThisThread {
                name: self.inner.name.clone(),
                op: "block_myself",
            });
        }

        log::debug!("thread '{}' blocking itself", self.inner.name);
        self.inner
            .signals
            .wait_and_reset(Event::Unblock, crate::config::WAIT_FOREVER);

        Ok(())
    }

    /// Wakes the thread from [`block_myself`](Self::block_myself).
    ///
    /// An unblock that arrives first is remembered until the next block.
    pub fn unblock(&self) {
        self.inner.signals.trigger(Event::Unblock);
    }

    pub fn mark_as_gui_thread(&self) {
        self.inner.native.lock().mark_gui();
    }

    pub fn is_gui_thread(&self) -> bool {
        self.inner.native.lock().is_gui()
    }

    /// Installs the callback run on the thread just before it terminates.
    ///
    /// # Returns
    /// The previously installed callback, if any.
    pub fn set_on_exit<F>(&self, callback: F) -> Option<OnExit>
    where
        F: FnMut(&ThreadHandle, ExitCode) + Send + 'static,
    {
        self.inner.on_exit.lock().replace(Box::new(callback))
    }

    /// True if both handles refer to the same thread object.
    pub fn same_as(&self, other: &ThreadHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread: {}, Running: {}, Id: ", self.name(), self.is_running())?;

        match self.tid() {
            Some(tid) => write!(f, "{}", tid),
            None => write!(f, "none"),
        }
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("tid", &self.tid())
            .finish()
    }
}

/// Owner of a worker thread.
///
/// Construction registers the name; dropping the `Thread` asks a still
/// running worker to shut down, waits a bounded time for it, and removes the
/// registration.
///
/// # Example
/// ```ignore
/// let worker = Thread::new("Worker1", FnBody(|thread: &ThreadHandle, _| {
///     while !thread.check_shutdown_request() {
///         thread.sleep_cancelable(Duration::from_millis(50));
///     }
///     Ok(ExitCode::ADMIN_STOP)
/// }), 0, false)?;
///
/// worker.start_default()?;
/// worker.req_shutdown_sync(WAIT_FOREVER)?;
/// assert_eq!(worker.wait_for_death(WAIT_FOREVER)?, ExitCode::ADMIN_STOP);
/// ```
pub struct Thread {
    handle: ThreadHandle,
}

impl Thread {
    /// Creates and registers a thread object. The OS thread is not started.
    ///
    /// # Arguments
    /// * `name` - Unique name, also used as the OS thread name
    /// * `body` - Code the thread runs
    /// * `stack_size` - Stack size in bytes, zero for the platform default
    /// * `self_priority` - Only the thread itself may change its priority
    ///
    /// # Returns
    /// The new object, or `DuplicateName` if another thread holds `name`.
    pub fn new<B>(name: &str, body: B, stack_size: usize, self_priority: bool) -> Result<Thread>
    where
        B: ThreadBody,
    {
        Self::with_parts(name, Box::new(body), stack_size, self_priority, None)
    }

    pub(crate) fn with_parts(
        name: &str,
        body: Box<dyn ThreadBody>,
        stack_size: usize,
        self_priority: bool,
        on_exit: Option<OnExit>,
    ) -> Result<Thread> {
        let inner = Arc::new(Inner::new(name, Some(body), stack_size, self_priority));
        *inner.on_exit.lock() = on_exit;

        REGISTRY.lock().register(name, Arc::downgrade(&inner))?;
        log::debug!("thread '{}' registered", name);

        Ok(Thread {
            handle: ThreadHandle::from_inner(inner),
        })
    }

    /// Starts the thread with no start data and no flags.
    pub fn start_default(&self) -> Result<()> {
        self.start(None, ThreadFlags::empty())
    }

    /// Spawns a new OS thread running the body.
    ///
    /// Returns once the thread has finished its `init` hook and reached its
    /// first checkpoint, or has already died (its exit code then tells why).
    ///
    /// # Arguments
    /// * `data` - Value handed to the body's `run`
    /// * `flags` - Start options, see [`ThreadFlags`]
    pub fn start(&self, data: StartData, flags: ThreadFlags) -> Result<()> {
        let inner = &self.handle.inner;

        // The new thread's first checkpoint pauses against this request,
        // which is how the starter learns that initialization is done.
        {
            let registry = REGISTRY.lock();
            if !inner.signals.try_begin() {
                return Err(ThreadError::AlreadyRunning(inner.name.clone()));
            }

            inner.signals.reset(Event::Sync);
            inner.signals.reset(Event::Response);
            inner.arm_request(&registry, current_id());
        }

        let was_primary = inner.primary.load(Ordering::SeqCst);
        if flags.contains(ThreadFlags::PRIMARY) {
            if let Err(err) = current::make_primary(self) {
                self.abandon_start(was_primary);
                return Err(err);
            }
        }
        if flags.contains(ThreadFlags::GUI) {
            self.mark_as_gui_thread();
        }

        inner.shutdown.store(false, Ordering::SeqCst);
        log::debug!("starting thread '{}'", inner.name);

        // The previous OS thread has published its death but may still be on
        // its way out, and it takes the native lock there.
        let previous = inner.native.lock().take_join();
        if let Some(previous) = previous {
            let _ = previous.join();
        }

        let spawned = {
            let entry = inner.clone();
            inner
                .native
                .lock()
                .begin(&inner.name, inner.stack_size, move || trampoline::run(entry, data))
        };

        if let Err(source) = spawned {
            self.abandon_start(was_primary);
            log::error!("failed to spawn thread '{}': {}", inner.name, source);

            return Err(ThreadError::StartFailed {
                name: inner.name.clone(),
                source,
            });
        }

        match inner.signals.wait_or_death(Event::Response, START_TIMEOUT) {
            Some(WaitOutcome::Signaled) => self.release(),
            Some(WaitOutcome::Died) => {
                inner.clear_request(&REGISTRY.lock());
                log::debug!("thread '{}' died during startup", inner.name);
                Ok(())
            }
            None => {
                inner.clear_request(&REGISTRY.lock());
                inner.signals.trigger(Event::Sync);
                if !was_primary {
                    current::clear_primary(inner);
                }
                log::error!("thread '{}' did not finish starting in time", inner.name);

                Err(ThreadError::Timeout {
                    name: inner.name.clone(),
                    op: "start",
                })
            }
        }
    }

    /// Undoes a start that never got an OS thread running.
    fn abandon_start(&self, was_primary: bool) {
        let inner = &self.handle.inner;

        inner.clear_request(&REGISTRY.lock());
        if !was_primary {
            current::clear_primary(inner);
        }
        inner.signals.abort_start();
    }

    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }
}

impl Deref for Thread {
    type Target = ThreadHandle;

    fn deref(&self) -> &ThreadHandle {
        &self.handle
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.handle, f)
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.handle, f)
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        let inner = &self.handle.inner;
        let is_caller = inner.is_caller();

        if self.is_running() && !is_caller {
            log::warn!("thread '{}' dropped while running, requesting shutdown", inner.name);
            inner.shutdown.store(true, Ordering::SeqCst);
            inner.signals.trigger(Event::Unblock);

            if inner.signals.wait_for_death(DROP_TIMEOUT).is_none() {
                log::error!(
                    "thread '{}' did not exit within {:?} of being dropped",
                    inner.name,
                    DROP_TIMEOUT
                );
                ExitCode::FATAL_ERROR.exit_process();
            }
        }

        // Joining our own OS thread would never return.
        if !is_caller {
            let finished = inner.native.lock().take_join();
            if let Some(finished) = finished {
                let _ = finished.join();
            }
        }

        REGISTRY.lock().remove_by_name(&inner.name);
        log::debug!("thread '{}' unregistered", inner.name);
    }
}
