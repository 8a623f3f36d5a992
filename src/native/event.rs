//! Per-thread binary events and death notification.
//!
//! Each thread object owns one [`Signals`] value: a small set of manual-reset
//! events plus the lifecycle state of the underlying OS thread, all behind a
//! single mutex and condition variable. Keeping them together is what makes
//! the combined "event fired, or the thread died" wait possible without
//! polling.
//!
//! # Lock ordering
//!
//! The registry mutex may be held while calling into this module (to reset or
//! trigger an event as part of a rendezvous transition). The reverse never
//! happens, and no wait here is ever entered with the registry mutex held.

use crate::exit::ExitCode;

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// The binary events a thread object owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    /// Blocks the target inside `sync` until the requester releases it.
    Sync,
    /// Tells the requester the target has paused, then that it resumed.
    Response,
    /// Wakes a thread parked in `block_myself`.
    Unblock,
}

/// Lifecycle of a thread object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// Constructed, never started.
    NotStarted,
    /// `start` has spawned the OS thread; the trampoline has not run yet.
    Starting,
    /// The trampoline is executing user code.
    Running,
    /// Termination hooks are running.
    Terminating,
    /// The OS thread finished; the exit code is available.
    Terminated,
}

impl ThreadState {
    /// True while an OS thread is attached to the object.
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            ThreadState::Starting | ThreadState::Running | ThreadState::Terminating
        )
    }
}

/// Result of a wait that also watches for thread death.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Signaled,
    Died,
}

struct SignalState {
    sync: bool,
    response: bool,
    unblock: bool,
    state: ThreadState,
    exit_code: Option<ExitCode>,
}

impl SignalState {
    fn flag(&mut self, event: Event) -> &mut bool {
        match event {
            Event::Sync => &mut self.sync,
            Event::Response => &mut self.response,
            Event::Unblock => &mut self.unblock,
        }
    }
}

pub(crate) struct Signals {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl Signals {
    /// Creates the events in their initial state.
    ///
    /// Sync and response start out triggered so that a stray `sync` before
    /// any request can never block.
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SignalState {
                sync: true,
                response: true,
                unblock: false,
                state: ThreadState::NotStarted,
                exit_code: None,
            }),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn reset(&self, event: Event) {
        *self.state.lock().flag(event) = false;
    }

    pub(crate) fn trigger(&self, event: Event) {
        *self.state.lock().flag(event) = true;
        self.cond.notify_all();
    }

    /// Waits for `event` to be triggered.
    ///
    /// Returns false on timeout. The event is left triggered.
    pub(crate) fn wait(&self, event: Event, timeout: Duration) -> bool {
        let mut guard = self.state.lock();
        self.wait_until(&mut guard, timeout, |s| *s.flag(event))
    }

    /// Waits for `event` and resets it in the same critical section.
    pub(crate) fn wait_and_reset(&self, event: Event, timeout: Duration) -> bool {
        let mut guard = self.state.lock();
        if !self.wait_until(&mut guard, timeout, |s| *s.flag(event)) {
            return false;
        }

        *guard.flag(event) = false;
        true
    }

    /// Waits for `event` or for the thread to terminate, whichever is first.
    ///
    /// # Returns
    /// `None` on timeout, otherwise which of the two happened. A triggered
    /// event wins over a simultaneous death.
    pub(crate) fn wait_or_death(&self, event: Event, timeout: Duration) -> Option<WaitOutcome> {
        let mut guard = self.state.lock();
        let done = self.wait_until(&mut guard, timeout, |s| {
            *s.flag(event) || s.state == ThreadState::Terminated
        });

        if !done {
            return None;
        }

        if *guard.flag(event) {
            Some(WaitOutcome::Signaled)
        } else {
            Some(WaitOutcome::Died)
        }
    }

    /// Waits until no OS thread is attached and returns the exit code.
    ///
    /// # Returns
    /// `None` on timeout. A thread that never ran reports no exit code.
    pub(crate) fn wait_for_death(&self, timeout: Duration) -> Option<Option<ExitCode>> {
        let mut guard = self.state.lock();
        if !self.wait_until(&mut guard, timeout, |s| !s.state.is_alive()) {
            return None;
        }

        Some(guard.exit_code)
    }

    pub(crate) fn state(&self) -> ThreadState {
        self.state.lock().state
    }

    pub(crate) fn exit_code(&self) -> Option<ExitCode> {
        self.state.lock().exit_code
    }

    pub(crate) fn set_state(&self, state: ThreadState) {
        self.state.lock().state = state;
        self.cond.notify_all();
    }

    /// Claims a start: moves to `Starting` and forgets the previous run's
    /// exit code.
    ///
    /// Returns false, changing nothing, if the thread is still alive. Only one
    /// of several concurrent starters can win.
    pub(crate) fn try_begin(&self) -> bool {
        let mut guard = self.state.lock();
        if guard.state.is_alive() {
            return false;
        }

        guard.state = ThreadState::Starting;
        guard.exit_code = None;
        guard.unblock = false;

        true
    }

    /// Publishes the thread's death. Every waiter wakes up.
    pub(crate) fn mark_dead(&self, exit_code: ExitCode) {
        let mut guard = self.state.lock();
        guard.state = ThreadState::Terminated;
        guard.exit_code = Some(exit_code);
        drop(guard);

        self.cond.notify_all();
    }

    /// Rolls back a `try_begin` whose start did not go through.
    pub(crate) fn abort_start(&self) {
        self.set_state(ThreadState::NotStarted);
    }

    fn wait_until<F>(
        &self,
        guard: &mut MutexGuard<'_, SignalState>,
        timeout: Duration,
        mut done: F,
    ) -> bool
    where
        F: FnMut(&mut SignalState) -> bool,
    {
        // `Duration::MAX` overflows the deadline and means "no deadline".
        let deadline = Instant::now().checked_add(timeout);

        while !done(&mut **guard) {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(guard, deadline).timed_out() {
                        return done(&mut **guard);
                    }
                }
                None => self.cond.wait(guard),
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_events_start_triggered() {
        let signals = Signals::new();

        assert!(signals.wait(Event::Sync, Duration::ZERO));
        assert!(signals.wait(Event::Response, Duration::ZERO));
        assert!(!signals.wait(Event::Unblock, Duration::from_millis(5)));
    }

    #[test]
    fn test_wait_or_death_sees_death() {
        let signals = Arc::new(Signals::new());
        signals.reset(Event::Response);
        assert!(signals.try_begin());

        let remote = signals.clone();
        let killer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.mark_dead(ExitCode(3));
        });

        let outcome = signals.wait_or_death(Event::Response, Duration::from_secs(5));
        killer.join().unwrap();

        assert_eq!(outcome, Some(WaitOutcome::Died));
        assert_eq!(signals.exit_code(), Some(ExitCode(3)));
    }

    #[test]
    fn test_wait_or_death_times_out() {
        let signals = Signals::new();
        signals.reset(Event::Response);
        assert!(signals.try_begin());

        assert_eq!(
            signals.wait_or_death(Event::Response, Duration::from_millis(10)),
            None
        );
    }

    #[test]
    fn test_only_one_begin_wins() {
        let signals = Arc::new(Signals::new());

        let winners: usize = (0..4)
            .map(|_| {
                let signals = signals.clone();
                thread::spawn(move || signals.try_begin())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(signals.state(), ThreadState::Starting);

        signals.mark_dead(ExitCode(1));
        assert!(signals.try_begin());
        assert_eq!(signals.exit_code(), None);
    }

    #[test]
    fn test_wait_and_reset_consumes() {
        let signals = Signals::new();
        signals.trigger(Event::Unblock);

        assert!(signals.wait_and_reset(Event::Unblock, Duration::ZERO));
        assert!(!signals.wait_and_reset(Event::Unblock, Duration::from_millis(5)));
    }
}
