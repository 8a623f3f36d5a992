//! Fixed-capacity slot storage with a free list.
//!
//! Indices stay stable for the lifetime of an entry, so callers can keep an
//! index as a cheap back-reference and go straight to the slot instead of
//! searching.

pub(crate) struct Slab<T> {
    items: Vec<Option<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Slab<T> {
    /// Creates an empty slab that will never hold more than `capacity` items.
    pub(crate) fn new(capacity: usize) -> Self {
        let items = (0..capacity).map(|_| None).collect();
        // Reversed so that `pop` hands out the lowest index first.
        let free = (0..capacity).rev().collect();

        Self {
            items,
            free,
            len: 0,
        }
    }

    /// Stores `item` in a free slot.
    ///
    /// # Returns
    /// The slot index, or the item back if every slot is taken.
    pub(crate) fn insert(&mut self, item: T) -> Result<usize, T> {
        let Some(index) = self.free.pop() else {
            return Err(item);
        };

        self.items[index] = Some(item);
        self.len += 1;

        Ok(index)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        let item = self.items.get_mut(index)?.take()?;

        self.free.push(index);
        self.len -= 1;

        Some(item)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)?.as_mut()
    }

    /// Iterates occupied slots in index order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|item| (index, item)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|item| (index, item)))
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_until_full() {
        let mut slab = Slab::new(2);

        assert_eq!(slab.insert("a"), Ok(0));
        assert_eq!(slab.insert("b"), Ok(1));
        assert_eq!(slab.insert("c"), Err("c"));
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn test_removed_slot_is_reused() {
        let mut slab = Slab::new(3);
        slab.insert(10).unwrap();
        let middle = slab.insert(20).unwrap();
        slab.insert(30).unwrap();

        assert_eq!(slab.remove(middle), Some(20));
        assert_eq!(slab.remove(middle), None);
        assert_eq!(slab.insert(40), Ok(middle));

        let values: Vec<_> = slab.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![10, 40, 30]);
    }
}
