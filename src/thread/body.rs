//! What a thread runs.
//!
//! A thread object owns one [`ThreadBody`]. The body survives a run: the
//! trampoline takes it out while the OS thread executes and puts it back
//! afterwards, so a terminated thread can be started again with the same
//! state.

use crate::exit::ExitCode;
use crate::thread::core::ThreadHandle;

use std::any::Any;
use std::error::Error;

/// Error type a body may fail with.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Outcome of a thread's entry point.
pub type RunResult = Result<ExitCode, BoxError>;

/// Opaque value handed to the entry point by `start`.
pub type StartData = Option<Box<dyn Any + Send>>;

/// Callback run on the thread itself just before it terminates.
pub type OnExit = Box<dyn FnMut(&ThreadHandle, ExitCode) + Send + 'static>;

/// The user code of a thread.
///
/// Only [`run`](ThreadBody::run) is required. Errors and panics escaping
/// `init` or `run` are logged and turn into [`ExitCode::RUNTIME_ERROR`].
///
/// # Example
/// ```ignore
/// struct Worker;
///
/// impl ThreadBody for Worker {
///     fn run(&mut self, thread: &ThreadHandle, _data: StartData) -> RunResult {
///         while !thread.check_shutdown_request() {
///             thread.sleep_cancelable(Duration::from_millis(10));
///         }
///         Ok(ExitCode::ADMIN_STOP)
///     }
/// }
/// ```
pub trait ThreadBody: Send + 'static {
    /// Runs on the new thread before the starter is released.
    fn init(&mut self, _thread: &ThreadHandle) -> Result<(), BoxError> {
        Ok(())
    }

    /// The entry point. Its exit code becomes the thread's exit code.
    fn run(&mut self, thread: &ThreadHandle, data: StartData) -> RunResult;

    /// Runs on the thread during termination, after the on-exit callback.
    fn terminate(&mut self, _thread: &ThreadHandle) {}
}

/// Adapts a closure into a [`ThreadBody`].
pub struct FnBody<F>(pub F);

impl<F> ThreadBody for FnBody<F>
where
    F: FnMut(&ThreadHandle, StartData) -> RunResult + Send + 'static,
{
    fn run(&mut self, thread: &ThreadHandle, data: StartData) -> RunResult {
        (self.0)(thread, data)
    }
}
