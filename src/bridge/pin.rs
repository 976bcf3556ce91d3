//! Pinning arena keeping host values alive while only the kernel refers to
//! them.
//!
//! Slots are addressed by 1-based [`PinIndex`]. The free-list always holds
//! the index one past the last slot, so acquiring never has to search: pop
//! an index, and if that was the seed, grow by one slot and push the next
//! seed. Storage never shrinks.

use std::{cell::RefCell, fmt, rc::Rc};

use log::{debug, trace};

use crate::host::value::Value;

/// 1-based index of an arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinIndex(usize);

impl PinIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for PinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct PinArena {
    slots: Vec<Option<Value>>,
    free_list: Vec<usize>,
    occupied: usize,
}

impl Default for PinArena {
    fn default() -> Self {
        Self::new()
    }
}

impl PinArena {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an arena with room for `capacity` slots before the backing
    /// storage has to reallocate.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut free_list = Vec::with_capacity(capacity + 1);
        free_list.push(1);
        Self {
            slots: Vec::with_capacity(capacity),
            free_list,
            occupied: 0,
        }
    }

    /// Stores `value` in a free slot and returns its index.
    pub fn acquire(&mut self, value: Value) -> PinIndex {
        let index = self.free_list.pop().unwrap_or(self.slots.len() + 1);
        if self.free_list.is_empty() {
            self.slots.push(None);
            self.free_list.push(index + 1);
            // Releasing every slot must never reallocate the free-list.
            let needed = self.slots.len() + 1;
            if self.free_list.capacity() < needed {
                self.free_list.reserve(needed - self.free_list.len());
            }
            if self.slots.len().is_power_of_two() {
                debug!("pin arena grew to {} slots", self.slots.len());
            }
        }
        self.slots[index - 1] = Some(value);
        self.occupied += 1;
        trace!("pinned host value in slot {}", index);
        PinIndex(index)
    }

    /// Clears the slot at `index` and returns the value it held.
    ///
    /// Releasing a vacant slot does nothing and returns `None`.
    pub fn release(&mut self, index: PinIndex) -> Option<Value> {
        let value = self.slots.get_mut(index.0 - 1)?.take()?;
        self.free_list.push(index.0);
        self.occupied -= 1;
        trace!("released slot {}", index);
        Some(value)
    }

    pub fn get(&self, index: PinIndex) -> Option<&Value> {
        self.slots.get(index.0.checked_sub(1)?)?.as_ref()
    }

    /// Number of backed slots, occupied or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn vacant(&self) -> usize {
        self.slots.len() - self.occupied
    }

    pub(crate) fn free_list(&self) -> &[usize] {
        &self.free_list
    }

    pub(crate) fn free_list_capacity(&self) -> usize {
        self.free_list.capacity()
    }
}

/// Shared handle to the session's [`PinArena`].
#[derive(Debug, Clone, Default)]
pub struct PinTable(Rc<RefCell<PinArena>>);

impl PinTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Rc::new(RefCell::new(PinArena::with_capacity(capacity))))
    }

    /// Pins `value` and returns the guard that owns the slot.
    pub fn pin(&self, value: Value) -> Pin {
        let index = self.0.borrow_mut().acquire(value);
        Pin {
            table: self.clone(),
            index,
        }
    }

    pub fn get(&self, index: PinIndex) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn occupied(&self) -> usize {
        self.0.borrow().occupied()
    }

    pub fn vacant(&self) -> usize {
        self.0.borrow().vacant()
    }
}

/// Owner of one occupied arena slot. Dropping it releases the slot.
pub struct Pin {
    table: PinTable,
    index: PinIndex,
}

impl Pin {
    pub fn index(&self) -> PinIndex {
        self.index
    }

    pub fn value(&self) -> Option<Value> {
        self.table.get(self.index)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pin({})", self.index)
    }
}

impl Drop for Pin {
    fn drop(&mut self) {
        let released = self.table.0.borrow_mut().release(self.index);
        // The value is dropped here, after the arena borrow has ended.
        drop(released);
    }
}
