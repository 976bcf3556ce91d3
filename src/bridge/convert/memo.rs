use std::{collections::HashMap, hash::Hash};

/// State of a memoised source node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MemoEntry<T> {
    /// Conversion started but the destination does not exist yet.
    InProgress,
    Done(T),
}

/// Identity-keyed memo for one top-level conversion.
///
/// Keys map to stable indices into `entries`, so an entry can be marked in
/// progress first and completed later without rehashing the key.
#[derive(Debug)]
pub(crate) struct ConversionMemo<K, T> {
    index: HashMap<K, usize>,
    entries: Vec<MemoEntry<T>>,
}

impl<K: Hash + Eq, T: Clone> ConversionMemo<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn lookup(&self, key: &K) -> Option<&MemoEntry<T>> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    /// Marks `key` as under construction and returns its slot.
    pub(crate) fn begin(&mut self, key: K) -> usize {
        let slot = self.entries.len();
        self.entries.push(MemoEntry::InProgress);
        self.index.insert(key, slot);
        slot
    }

    pub(crate) fn finish(&mut self, slot: usize, value: T) {
        self.entries[slot] = MemoEntry::Done(value);
    }

    /// Records a finished destination for `key` in one step.
    pub(crate) fn insert(&mut self, key: K, value: T) {
        let slot = self.begin(key);
        self.finish(slot, value);
    }
}
