//! Cooperative rendezvous between a thread and one requester.
//!
//! A requester calls [`wait_sync`](ThreadHandle::wait_sync) to ask a target
//! thread to pause. The target only pauses at a checkpoint it chooses, by
//! calling [`sync`](ThreadHandle::sync) (directly, or through
//! `check_shutdown_request` / `sleep_cancelable`). While it is paused the
//! requester may inspect or change state the target owns, then lets it go
//! with [`release`](ThreadHandle::release).
//!
//! ```text
//!  requester                         target
//!  ─────────                         ──────
//!  wait_sync: Idle -> Requested
//!    reset sync, response
//!    wait response ──────────┐
//!                            │       sync: Requested -> Paused
//!                            └────── trigger response
//!  ... target is frozen ...          wait sync ───────┐
//!  release: Paused -> Idle                            │
//!    reset response                                   │
//!    trigger sync ────────────────────────────────────┘
//!    wait response ──────────┐       trigger response
//!                            └──────
//! ```
//!
//! State changes happen only with the registry mutex held, which the
//! transition methods below demand as an argument. No lock is held across
//! any of the waits. Every wait by a requester also wakes when the target
//! dies, so a thread exiting mid-protocol never strands its requester.
//!
//! Shutdown requests ride on the same protocol: the requester pauses the
//! target, sets its shutdown flag, and releases it, so the flag is observed
//! at a well-defined point.

use crate::config::{RELEASE_TIMEOUT, SLEEP_SLICE, SYNC_TIMEOUT};
use crate::error::{Result, ThreadError};
use crate::native::event::{Event, WaitOutcome};
use crate::native::{ThreadId, current_id};
use crate::registry::{REGISTRY, Registry};
use crate::thread::core::{Inner, ThreadHandle};

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum RendezvousState {
    Idle = 0,
    Requested = 1,
    Paused = 2,
}

impl RendezvousState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RendezvousState::Requested,
            2 => RendezvousState::Paused,
            _ => RendezvousState::Idle,
        }
    }
}

impl Inner {
    pub(crate) fn rendezvous(&self) -> RendezvousState {
        RendezvousState::from_u8(self.rendezvous.load(Ordering::Acquire))
    }

    pub(crate) fn requester(&self) -> Option<ThreadId> {
        ThreadId::from_u64(self.requester.load(Ordering::Acquire))
    }

    pub(crate) fn arm_request(&self, _registry: &Registry<Inner>, requester: ThreadId) {
        self.requester.store(requester.as_u64(), Ordering::Release);
        self.rendezvous
            .store(RendezvousState::Requested as u8, Ordering::Release);
    }

    fn mark_paused(&self, _registry: &Registry<Inner>) {
        self.rendezvous
            .store(RendezvousState::Paused as u8, Ordering::Release);
    }

    pub(crate) fn clear_request(&self, _registry: &Registry<Inner>) {
        self.rendezvous
            .store(RendezvousState::Idle as u8, Ordering::Release);
        self.requester.store(0, Ordering::Release);
    }
}

impl ThreadHandle {
    /// Checkpoint: pauses here if another thread has requested a rendezvous.
    ///
    /// Only the thread itself may call this. Without a pending request it
    /// returns immediately without taking any lock.
    pub fn sync(&self) -> Result<()> {
        let inner = &self.inner;

        if !inner.is_caller() {
            return Err(ThreadError::NotThisThread {
                name: inner.name.clone(),
                op: "sync",
            });
        }

        if inner.rendezvous() == RendezvousState::Idle {
            return Ok(());
        }

        {
            let registry = REGISTRY.lock();
            if inner.rendezvous() != RendezvousState::Requested {
                return Ok(());
            }

            inner.mark_paused(&registry);
            inner.signals.trigger(Event::Response);
        }

        if !inner.signals.wait(Event::Sync, SYNC_TIMEOUT) {
            inner.clear_request(&REGISTRY.lock());
            log::error!("thread '{}' was never released from sync", inner.name);

            return Err(ThreadError::Timeout {
                name: inner.name.clone(),
                op: "sync",
            });
        }

        inner.signals.trigger(Event::Response);

        Ok(())
    }

    /// Requests a rendezvous and waits until the thread has paused.
    ///
    /// On success the thread stays paused until the caller invokes
    /// [`release`](Self::release).
    ///
    /// # Arguments
    /// * `timeout` - How long to wait for the thread to reach a checkpoint
    ///
    /// # Returns
    /// `Ok` once the thread is paused. `NotRunning` if it is not running or
    /// died while we waited, `AlreadySynced` if another requester got there
    /// first, `Timeout` if it never reached a checkpoint.
    pub fn wait_sync(&self, timeout: Duration) -> Result<()> {
        let inner = &self.inner;

        if inner.is_caller() {
            return Err(ThreadError::SyncWithSelf(inner.name.clone()));
        }
        if !self.is_running() {
            return Err(ThreadError::NotRunning(inner.name.clone()));
        }

        {
            let registry = REGISTRY.lock();
            if inner.rendezvous() != RendezvousState::Idle {
                let requester = match inner.requester() {
                    Some(tid) => registry
                        .name_of(tid)
                        .map_or_else(|| tid.to_string(), str::to_string),
                    None => "unknown".to_string(),
                };

                return Err(ThreadError::AlreadySynced {
                    name: inner.name.clone(),
                    requester,
                });
            }

            inner.signals.reset(Event::Sync);
            inner.signals.reset(Event::Response);
            inner.arm_request(&registry, current_id());
        }

        match inner.signals.wait_or_death(Event::Response, timeout) {
            Some(WaitOutcome::Signaled) => Ok(()),
            Some(WaitOutcome::Died) => {
                inner.clear_request(&REGISTRY.lock());
                Err(ThreadError::NotRunning(inner.name.clone()))
            }
            None => {
                inner.clear_request(&REGISTRY.lock());
                // The thread may pause right after we gave up.
                inner.signals.trigger(Event::Sync);

                Err(ThreadError::Timeout {
                    name: inner.name.clone(),
                    op: "wait_sync",
                })
            }
        }
    }

    /// Lets a thread paused by [`wait_sync`](Self::wait_sync) continue.
    ///
    /// Only the thread that made the request may release it. Returns after
    /// the thread confirms it resumed, or died.
    pub fn release(&self) -> Result<()> {
        let inner = &self.inner;

        let was_paused = {
            let registry = REGISTRY.lock();
            let state = inner.rendezvous();

            if state == RendezvousState::Idle {
                log::warn!("release of thread '{}' without a pending sync", inner.name);
                return Ok(());
            }
            if inner.requester() != Some(current_id()) {
                return Err(ThreadError::NotSyncRequester(inner.name.clone()));
            }

            inner.clear_request(&registry);
            inner.signals.reset(Event::Response);
            inner.signals.trigger(Event::Sync);

            state == RendezvousState::Paused
        };

        // A request the thread never paused for has nobody to answer it.
        if !was_paused {
            return Ok(());
        }

        match inner.signals.wait_or_death(Event::Response, RELEASE_TIMEOUT) {
            Some(_) => Ok(()),
            None => Err(ThreadError::Timeout {
                name: inner.name.clone(),
                op: "release",
            }),
        }
    }

    /// Asks the thread to shut down and waits until it has seen the request.
    ///
    /// The flag is set while the thread is paused, so the next
    /// `check_shutdown_request` it makes returns true. A thread that is not
    /// running (or dies meanwhile) counts as already shut down.
    pub fn req_shutdown_sync(&self, timeout: Duration) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        match self.wait_sync(timeout) {
            Ok(()) => {}
            Err(ThreadError::NotRunning(_)) => return Ok(()),
            Err(err) => return Err(err),
        }

        self.inner.shutdown.store(true, Ordering::SeqCst);
        log::debug!("shutdown requested for thread '{}'", self.inner.name);

        if let Err(err) = self.release() {
            self.inner.shutdown.store(false, Ordering::SeqCst);
            return Err(err);
        }

        Ok(())
    }

    /// Sets the shutdown flag without waiting for the thread.
    pub fn req_shutdown_no_sync(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        log::debug!("shutdown requested for thread '{}' (no sync)", self.inner.name);
    }

    /// Takes a checkpoint, then reports whether shutdown was requested.
    ///
    /// Called from another thread it just reads the flag.
    pub fn check_shutdown_request(&self) -> bool {
        if self.inner.is_caller() {
            if let Err(err) = self.sync() {
                log::error!("checkpoint in thread '{}' failed: {}", self.inner.name, err);
            }
        }

        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Clears the shutdown flag.
    pub fn ack_shutdown_request(&self) {
        self.inner.shutdown.store(false, Ordering::SeqCst);
    }

    /// Sleeps for `duration`, taking checkpoints along the way.
    ///
    /// # Returns
    /// True if the full duration elapsed, false if a shutdown request cut
    /// the sleep short. A zero duration only checks the flag.
    pub fn sleep_cancelable(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.check_shutdown_request();
        }

        let deadline = Instant::now().checked_add(duration);

        loop {
            let slice = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return true;
                    }
                    left.min(SLEEP_SLICE)
                }
                None => SLEEP_SLICE,
            };

            thread::sleep(slice);

            if self.check_shutdown_request() {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::ThreadBuilder;
    use crate::config::WAIT_FOREVER;
    use crate::exit::ExitCode;

    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_idle_checkpoint_skips_native_lock() {
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();

        let worker = ThreadBuilder::new("UnlockedCheckpoint")
            .entry(move |thread, _| {
                go_rx.recv()?;
                for _ in 0..100 {
                    thread.sync()?;
                }
                done_tx.send(())?;
                Ok(ExitCode::NORMAL)
            })
            .build()
            .unwrap();
        worker.start_default().unwrap();

        {
            let _native = worker.inner.native.lock();
            go_tx.send(()).unwrap();
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        assert_eq!(worker.wait_for_death(WAIT_FOREVER).unwrap(), ExitCode::NORMAL);
    }
}
