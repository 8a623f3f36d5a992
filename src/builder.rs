//! Fluent builder for Thread construction.
//!
//! Provides a builder pattern interface for creating and configuring
//! [`Thread`] instances without spelling out every constructor argument.

use crate::error::Result;
use crate::exit::ExitCode;
use crate::thread::core::normalize_stack_size;
use crate::thread::{FnBody, OnExit, RunResult, StartData, Thread, ThreadBody, ThreadHandle};

/// Builder for constructing Thread instances with fluent API.
///
/// A body is required; everything else has a default (platform stack size,
/// priority changeable from any thread, no on-exit callback).
///
/// # Example
/// ```ignore
/// let worker = ThreadBuilder::new("Worker1")
///     .stack_size(256 * 1024)
///     .self_priority(true)
///     .entry(|thread, _| {
///         while !thread.check_shutdown_request() {
///             thread.sleep_cancelable(Duration::from_millis(10));
///         }
///         Ok(ExitCode::ADMIN_STOP)
///     })
///     .build()?;
/// ```
pub struct ThreadBuilder {
    name: String,
    stack_size: usize,
    self_priority: bool,
    on_exit: Option<OnExit>,
    body: Option<Box<dyn ThreadBody>>,
}

impl ThreadBuilder {
    /// Creates a new thread builder.
    ///
    /// # Arguments
    /// * `name` - Unique thread name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stack_size: 0,
            self_priority: false,
            on_exit: None,
            body: None,
        }
    }

    /// Sets the stack size in bytes.
    ///
    /// Zero selects the platform default; anything else below 64 KiB is
    /// raised to 64 KiB.
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = normalize_stack_size(stack_size);
        self
    }

    /// Restricts priority changes to the thread itself.
    pub fn self_priority(mut self, enabled: bool) -> Self {
        self.self_priority = enabled;
        self
    }

    /// Installs a callback run on the thread just before it terminates.
    pub fn on_exit<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ThreadHandle, ExitCode) + Send + 'static,
    {
        self.on_exit = Some(Box::new(callback));
        self
    }

    /// Sets the code the thread runs.
    pub fn body<B: ThreadBody>(mut self, body: B) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// Sets a closure as the thread's entry point.
    pub fn entry<F>(self, entry: F) -> Self
    where
        F: FnMut(&ThreadHandle, StartData) -> RunResult + Send + 'static,
    {
        self.body(FnBody(entry))
    }

    /// Builds and registers the thread. It is not started.
    ///
    /// A builder without a body produces a thread whose entry point returns
    /// [`ExitCode::NORMAL`] immediately.
    ///
    /// # Returns
    /// The new thread, or `DuplicateName` if the name is taken.
    pub fn build(self) -> Result<Thread> {
        let body: Box<dyn ThreadBody> = match self.body {
            Some(body) => body,
            None => Box::new(FnBody(exit_normally)),
        };

        Thread::with_parts(
            &self.name,
            body,
            self.stack_size,
            self.self_priority,
            self.on_exit,
        )
    }
}

fn exit_normally(_: &ThreadHandle, _: StartData) -> RunResult {
    Ok(ExitCode::NORMAL)
}
