//! Process-wide table of thread objects.
//!
//! Every thread object is entered here when it is constructed, so names are
//! unique from the start. An entry only gains an OS id once its thread is
//! actually running (the trampoline assigns it), which is what makes "which
//! thread object am I?" answerable from any thread.
//!
//! Entries hold [`Weak`] references: the owner of a thread object controls
//! its lifetime, and removes the entry when it drops the object. Upgraded
//! references are only handed out while the registry mutex is held by the
//! caller, who decides how long to keep them.
//!
//! The registry mutex is also the lock that guards rendezvous transitions
//! on every thread object. It is always taken before a thread's own signal
//! lock, never after.

use crate::config::MAX_THREADS;
use crate::error::{Result, ThreadError};
use crate::native::ThreadId;
use crate::thread::core::Inner;
use crate::utils::slab::Slab;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

lazy_static! {
    /// The one registry of the process.
    pub(crate) static ref REGISTRY: Mutex<Registry<Inner>> = Mutex::new(Registry::new(MAX_THREADS));
}

struct Slot<T> {
    tid: Option<ThreadId>,
    name: String,
    thread: Weak<T>,
}

pub(crate) struct Registry<T> {
    slots: Slab<Slot<T>>,
    /// Keeps the adopted process main thread alive for the process lifetime.
    adopted: Option<Arc<T>>,
    primary: Option<Weak<T>>,
}

impl<T> Registry<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Slab::new(capacity),
            adopted: None,
            primary: None,
        }
    }

    /// Enters a thread object under `name` with no OS id yet.
    ///
    /// Aborts the process when the table is full.
    ///
    /// # Returns
    /// The slot index, or `DuplicateName` if the name is taken.
    pub(crate) fn register(&mut self, name: &str, thread: Weak<T>) -> Result<usize> {
        if self.slot_of(name).is_some() {
            return Err(ThreadError::DuplicateName(name.to_string()));
        }

        let slot = Slot {
            tid: None,
            name: name.to_string(),
            thread,
        };

        match self.slots.insert(slot) {
            Ok(index) => Ok(index),
            Err(_) => {
                log::error!(
                    "thread registry is full ({} entries), cannot register '{}'",
                    self.slots.capacity(),
                    name
                );
                log::logger().flush();
                std::process::abort();
            }
        }
    }

    /// Records `tid` as the OS id of the entry named `name`.
    ///
    /// The entry is re-created from `thread` if it has gone missing. Any
    /// stale entry still claiming `tid` loses it first.
    pub(crate) fn attach(&mut self, name: &str, tid: ThreadId, thread: Weak<T>) -> Result<()> {
        for (_, slot) in self.slots.iter_mut() {
            if slot.tid == Some(tid) && slot.name != name {
                log::warn!("thread '{}' still held id {}, clearing it", slot.name, tid);
                slot.tid = None;
            }
        }

        let index = match self.slot_of(name) {
            Some(index) => index,
            None => {
                log::warn!("thread '{}' was not registered, re-adding it", name);
                self.register(name, thread)?
            }
        };

        if let Some(slot) = self.slots.get_mut(index) {
            slot.tid = Some(tid);
        }

        Ok(())
    }

    /// Forgets the OS id of `name`; the entry itself stays.
    pub(crate) fn detach(&mut self, name: &str) {
        if let Some(slot) = self.slot_of(name).and_then(|index| self.slots.get_mut(index)) {
            slot.tid = None;
        }
    }

    pub(crate) fn find_by_id(&self, tid: ThreadId) -> Option<Arc<T>> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.tid == Some(tid))
            .and_then(|(_, slot)| slot.thread.upgrade())
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<Arc<T>> {
        let index = self.slot_of(name)?;
        self.slots.get(index)?.thread.upgrade()
    }

    /// Name of the entry holding `tid`, if any.
    pub(crate) fn name_of(&self, tid: ThreadId) -> Option<&str> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.tid == Some(tid))
            .map(|(_, slot)| slot.name.as_str())
    }

    pub(crate) fn remove_by_name(&mut self, name: &str) -> bool {
        match self.slot_of(name) {
            Some(index) => self.slots.remove(index).is_some(),
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn has_adopted(&self) -> bool {
        self.adopted.is_some()
    }

    pub(crate) fn set_adopted(&mut self, thread: Arc<T>) {
        self.adopted = Some(thread);
    }

    /// The current primary thread, if it is still alive.
    pub(crate) fn primary(&self) -> Option<Arc<T>> {
        self.primary.as_ref()?.upgrade()
    }

    pub(crate) fn set_primary(&mut self, thread: &Arc<T>) {
        self.primary = Some(Arc::downgrade(thread));
    }

    /// Forgets the primary thread if it is `thread`.
    ///
    /// # Returns
    /// True if `thread` was the primary thread.
    pub(crate) fn clear_primary(&mut self, thread: &Arc<T>) -> bool {
        let is_primary = self
            .primary
            .as_ref()
            .is_some_and(|primary| std::ptr::eq(primary.as_ptr(), Arc::as_ptr(thread)));

        if is_primary {
            self.primary = None;
        }

        is_primary
    }

    fn slot_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.name == name)
            .map(|(index, _)| index)
    }
}

/// Number of thread objects currently registered.
pub fn thread_count() -> usize {
    REGISTRY.lock().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(raw: u64) -> ThreadId {
        ThreadId::from_u64(raw).unwrap()
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = Registry::new(4);
        let a = Arc::new(1);
        let b = Arc::new(2);

        registry.register("Dup", Arc::downgrade(&a)).unwrap();
        let err = registry.register("Dup", Arc::downgrade(&b)).unwrap_err();

        assert!(matches!(err, ThreadError::DuplicateName(name) if name == "Dup"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_by_id_needs_attach() {
        let mut registry = Registry::new(4);
        let worker = Arc::new("worker");
        registry.register("Worker", Arc::downgrade(&worker)).unwrap();

        assert!(registry.find_by_id(tid(7)).is_none());
        assert_eq!(registry.find_by_name("Worker").as_deref(), Some(&"worker"));

        registry.attach("Worker", tid(7), Arc::downgrade(&worker)).unwrap();
        assert_eq!(registry.find_by_id(tid(7)).as_deref(), Some(&"worker"));
        assert_eq!(registry.name_of(tid(7)), Some("Worker"));

        registry.detach("Worker");
        assert!(registry.find_by_id(tid(7)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_attach_steals_stale_id() {
        let mut registry = Registry::new(4);
        let old = Arc::new(1);
        let new = Arc::new(2);
        registry.register("Old", Arc::downgrade(&old)).unwrap();
        registry.register("New", Arc::downgrade(&new)).unwrap();

        registry.attach("Old", tid(9), Arc::downgrade(&old)).unwrap();
        registry.attach("New", tid(9), Arc::downgrade(&new)).unwrap();

        assert_eq!(registry.find_by_id(tid(9)).as_deref(), Some(&2));
        assert_eq!(registry.name_of(tid(9)), Some("New"));
    }

    #[test]
    fn test_attach_re_adds_missing_entry() {
        let mut registry = Registry::new(4);
        let thread = Arc::new(5);

        registry.attach("Lost", tid(3), Arc::downgrade(&thread)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find_by_id(tid(3)).as_deref(), Some(&5));
    }

    #[test]
    fn test_remove_frees_the_name() {
        let mut registry = Registry::new(1);
        let a = Arc::new(1);
        registry.register("Solo", Arc::downgrade(&a)).unwrap();

        assert!(registry.remove_by_name("Solo"));
        assert!(!registry.remove_by_name("Solo"));
        assert!(registry.register("Solo", Arc::downgrade(&a)).is_ok());
    }

    #[test]
    fn test_dropped_primary_is_forgotten() {
        let mut registry = Registry::new(2);
        let primary = Arc::new(1);
        registry.set_primary(&primary);
        assert!(registry.primary().is_some());

        drop(primary);
        assert!(registry.primary().is_none());
    }

    #[test]
    fn test_clear_primary_only_clears_that_thread() {
        let mut registry = Registry::new(2);
        let primary = Arc::new(1);
        let other = Arc::new(2);
        registry.set_primary(&primary);

        assert!(!registry.clear_primary(&other));
        assert!(registry.primary().is_some());

        assert!(registry.clear_primary(&primary));
        assert!(registry.primary().is_none());
        assert!(!registry.clear_primary(&primary));
    }
}
