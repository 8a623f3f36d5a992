//! Thread objects and everything that operates on them.
//!
//! - [`core`](self::core): the owning [`Thread`] and the shared [`ThreadHandle`]
//! - [`body`]: the user code a thread runs
//! - [`rendezvous`]: sync/release checkpoints and shutdown requests
//! - [`trampoline`]: what every spawned OS thread executes
//! - [`current`]: finding the calling thread's object
//! - [`guard`]: scoped priority and rendezvous helpers

pub(crate) mod body;
pub(crate) mod core;
pub(crate) mod current;
pub(crate) mod guard;
pub(crate) mod rendezvous;
pub(crate) mod trampoline;

pub use body::{BoxError, FnBody, OnExit, RunResult, StartData, ThreadBody};
pub use self::core::{Thread, ThreadFlags, ThreadHandle};
pub use current::{current_thread, current_thread_id, make_primary, try_current_thread};
pub use guard::{PriorityGuard, SyncGuard};
