//! Entry point of every spawned thread.
//!
//! The trampoline binds the new OS thread to its thread object, runs the
//! body, and guarantees the rest of the process hears about the thread's
//! death whatever the body did. Nothing unwinds past it.

use crate::exit::ExitCode;
use crate::native::event::ThreadState;
use crate::registry::REGISTRY;
use crate::thread::body::{StartData, ThreadBody};
use crate::thread::core::{Inner, ThreadHandle};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Publishes the thread's death when dropped, even while unwinding.
struct DeathNotice<'a> {
    inner: &'a Inner,
    code: ExitCode,
}

impl Drop for DeathNotice<'_> {
    fn drop(&mut self) {
        self.inner.signals.mark_dead(self.code);
    }
}

pub(crate) fn run(inner: Arc<Inner>, data: StartData) {
    let tid = inner.attach_caller();

    if let Err(err) = REGISTRY
        .lock()
        .attach(&inner.name, tid, Arc::downgrade(&inner))
    {
        log::error!("thread '{}' could not be registered: {}", inner.name, err);
    }

    inner.signals.set_state(ThreadState::Running);
    log::debug!("thread '{}' running as {}", inner.name, tid);

    let mut death = DeathNotice {
        inner: &inner,
        code: ExitCode::RUNTIME_ERROR,
    };

    let handle = ThreadHandle::from_inner(inner.clone());
    let mut body = inner.body.lock().take();

    let code = match body.as_deref_mut() {
        Some(body) => run_body(&handle, body, data),
        None => {
            log::error!("thread '{}' has no body to run", inner.name);
            ExitCode::RUNTIME_ERROR
        }
    };

    shutdown_processing(&handle, body.as_deref_mut(), code);

    inner.detach_caller();
    *inner.body.lock() = body;

    log::debug!("thread '{}' exited with {}", inner.name, code);
    death.code = code;
    drop(death);

    if inner.primary.load(Ordering::SeqCst) {
        log::debug!("primary thread '{}' ended, exiting process", inner.name);
        code.exit_process();
    }
}

fn run_body(handle: &ThreadHandle, body: &mut dyn ThreadBody, data: StartData) -> ExitCode {
    let name = handle.name();

    match panic::catch_unwind(AssertUnwindSafe(|| body.init(handle))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            log::error!("thread '{}' failed to initialize: {}", name, err);
            return ExitCode::RUNTIME_ERROR;
        }
        Err(payload) => {
            log::error!(
                "thread '{}' panicked during init: {}",
                name,
                panic_message(&*payload)
            );
            return ExitCode::RUNTIME_ERROR;
        }
    }

    // First checkpoint: pauses against the starter's request, releasing it.
    if let Err(err) = handle.sync() {
        log::error!("thread '{}' startup checkpoint failed: {}", name, err);
    }

    match panic::catch_unwind(AssertUnwindSafe(|| body.run(handle, data))) {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => {
            log::error!("thread '{}' failed: {}", name, err);
            ExitCode::RUNTIME_ERROR
        }
        Err(payload) => {
            log::error!("thread '{}' panicked: {}", name, panic_message(&*payload));
            ExitCode::RUNTIME_ERROR
        }
    }
}

/// Termination bookkeeping, on the dying thread: on-exit callback, then the
/// body's terminate hook, then the registry forgets the OS id.
///
/// Runs without the registry lock so both hooks may use the crate freely.
fn shutdown_processing(
    handle: &ThreadHandle,
    body: Option<&mut (dyn ThreadBody + 'static)>,
    code: ExitCode,
) {
    let inner = &handle.inner;
    inner.signals.set_state(ThreadState::Terminating);

    let on_exit = inner.on_exit.lock().take();
    if let Some(mut on_exit) = on_exit {
        if panic::catch_unwind(AssertUnwindSafe(|| on_exit(handle, code))).is_err() {
            log::error!("on-exit callback of thread '{}' panicked", inner.name);
        }

        // Keep it for the next run unless the callback installed a new one.
        let mut slot = inner.on_exit.lock();
        if slot.is_none() {
            *slot = Some(on_exit);
        }
    }

    if let Some(body) = body {
        if panic::catch_unwind(AssertUnwindSafe(|| body.terminate(handle))).is_err() {
            log::error!("terminate hook of thread '{}' panicked", inner.name);
        }
    }

    REGISTRY.lock().detach(&inner.name);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
