use alloc::vec::Vec;

use super::handle::Handle;

/// One arena slot. Vacant slots thread together into a free list headed by
/// [`Arena::next_free`], so freeing costs no auxiliary storage.
#[derive(Clone)]
enum Slot<T> {
    Occupied(T),
    Vacant(Option<Handle>),
}

/// A slab of `T` addressed by [`Handle`]s.
///
/// Slots freed by [`take`](Arena::take) are recycled most-recently-freed
/// first, so a delete-then-insert workload keeps touching the same memory.
/// Handles are only ever invalidated by [`clear`](Arena::clear); accessing
/// a vacant slot is a caller bug and panics.
#[derive(Clone)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    next_free: Option<Handle>,
    occupied: usize,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_free: None,
            occupied: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            next_free: None,
            occupied: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub(crate) const fn len(&self) -> usize {
        self.occupied
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub(crate) fn alloc(&mut self, element: T) -> Handle {
        if let Some(handle) = self.next_free {
            // Pop the head of the free list and occupy it.
            match self.slots[handle.to_index()] {
                Slot::Vacant(next) => self.next_free = next,
                Slot::Occupied(_) => panic!("`Arena::alloc()` - free list points at an occupied slot!"),
            }
            self.slots[handle.to_index()] = Slot::Occupied(element);
            self.occupied += 1;
            handle
        } else {
            // Handles are indices + 1, so the slot count may not exceed
            // `Handle::MAX`.
            assert!(
                self.slots.len() < Handle::MAX,
                "`Arena::alloc()` - arena is at maximum capacity ({})",
                Handle::MAX
            );
            self.slots.push(Slot::Occupied(element));
            self.occupied += 1;
            Handle::from_index(self.slots.len() - 1)
        }
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        match &self.slots[handle.to_index()] {
            Slot::Occupied(element) => element,
            Slot::Vacant(_) => panic!("`Arena::get()` - `handle` is invalid!"),
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        match &mut self.slots[handle.to_index()] {
            Slot::Occupied(element) => element,
            Slot::Vacant(_) => panic!("`Arena::get_mut()` - `handle` is invalid!"),
        }
    }

    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let slot = core::mem::replace(&mut self.slots[handle.to_index()], Slot::Vacant(self.next_free));
        match slot {
            Slot::Occupied(element) => {
                self.next_free = Some(handle);
                self.occupied -= 1;
                element
            }
            Slot::Vacant(next) => {
                // Undo the replacement before reporting the misuse.
                self.slots[handle.to_index()] = Slot::Vacant(next);
                panic!("`Arena::take()` - `handle` is invalid!");
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.next_free = None;
        self.occupied = 0;
    }
}
