//! Platform layer: OS threads, binary events and priorities.
//!
//! Everything above this module talks to the host only through:
//! - [`thread`]: spawning, OS identity and the process-main check
//! - [`event`]: manual-reset events with an "event or death" wait
//! - [`priority`]: portable priority levels mapped onto the host scheduler

pub(crate) mod event;
pub(crate) mod priority;
pub(crate) mod thread;

pub use event::ThreadState;
pub use priority::Priority;
pub use thread::{ThreadId, current_id};
