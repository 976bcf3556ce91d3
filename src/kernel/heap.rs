use std::{any::Any, collections::HashMap};

use log::{debug, trace};

use crate::kernel::{
    heap_object::HeapObject,
    obj::{BagRef, Obj, TNum},
};

pub(crate) const DEFAULT_GC_THRESHOLD: usize = 10_000;
pub(crate) const MIN_GC_THRESHOLD: usize = 64;

/// Free function run on a swept package bag's payload before it is dropped.
///
/// Runs inside the sweep: it must not fail and must not allocate kernel
/// objects.
pub type Finalizer = fn(&mut dyn Any);

struct HeapEntry {
    object: HeapObject,
    marked: bool,
}

/// Stop-the-world mark-and-sweep heap holding every kernel bag.
///
/// Freed slots are recycled through a free-list before the storage vector
/// grows. Collection only happens when the owner calls [`KernelHeap::collect`].
pub struct KernelHeap {
    entries: Vec<Option<HeapEntry>>,
    free_list: Vec<u32>,
    finalizers: HashMap<TNum, Finalizer>,
    allocation_count: usize,
    gc_threshold: usize,
    gc_enabled: bool,
    total_collections: usize,
    total_allocations: usize,
}

impl Default for KernelHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelHeap {
    /// Creates a heap with the default threshold and collection enabled.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            finalizers: HashMap::new(),
            allocation_count: 0,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_enabled: true,
            total_collections: 0,
            total_allocations: 0,
        }
    }

    /// Creates a heap with a custom allocation threshold (not clamped).
    pub fn with_threshold(threshold: usize) -> Self {
        let mut heap = Self::new();
        heap.gc_threshold = threshold;
        heap
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.gc_enabled = enabled
    }

    pub fn threshold(&self) -> usize {
        self.gc_threshold
    }

    /// Returns `true` when GC is enabled and the threshold was reached.
    pub fn should_collect(&self) -> bool {
        self.gc_enabled && self.allocation_count >= self.gc_threshold
    }

    /// Installs the free function for bags of type `tnum`.
    pub fn set_finalizer(&mut self, tnum: TNum, finalizer: Finalizer) {
        self.finalizers.insert(tnum, finalizer);
    }

    pub fn alloc(&mut self, object: HeapObject) -> BagRef {
        self.allocation_count += 1;
        self.total_allocations += 1;

        let entry = HeapEntry {
            object,
            marked: false,
        };

        if let Some(idx) = self.free_list.pop() {
            self.entries[idx as usize] = Some(entry);
            BagRef(idx)
        } else {
            let idx = self.entries.len() as u32;
            self.entries.push(Some(entry));
            BagRef(idx)
        }
    }

    /// Panics if the bag was already swept.
    pub fn get(&self, bag: BagRef) -> &HeapObject {
        &self.entries[bag.0 as usize]
            .as_ref()
            .expect("KernelHeap::get: bag used after it was collected")
            .object
    }

    /// Panics if the bag was already swept.
    pub fn get_mut(&mut self, bag: BagRef) -> &mut HeapObject {
        &mut self.entries[bag.0 as usize]
            .as_mut()
            .expect("KernelHeap::get_mut: bag used after it was collected")
            .object
    }

    pub fn is_live(&self, bag: BagRef) -> bool {
        matches!(self.entries.get(bag.0 as usize), Some(Some(_)))
    }

    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }

    pub fn total_collections(&self) -> usize {
        self.total_collections
    }

    /// Runs a full collection from the given roots and returns the number of
    /// bags freed.
    pub fn collect(&mut self, globals: &[Obj], stack: &[Obj]) -> usize {
        self.mark(globals.iter().chain(stack.iter()).copied());

        let live_before = self.live_count();
        let collected = self.sweep();

        self.total_collections += 1;
        self.allocation_count = 0;
        self.adapt_threshold(collected, live_before);

        debug!(
            "kernel gc #{}: freed {} of {} bags",
            self.total_collections, collected, live_before
        );
        collected
    }

    fn mark(&mut self, roots: impl Iterator<Item = Obj>) {
        let mut worklist: Vec<Obj> = roots.collect();
        let mut children = Vec::with_capacity(16);

        while let Some(obj) = worklist.pop() {
            let Obj::Bag(bag) = obj else {
                continue;
            };
            let Some(Some(entry)) = self.entries.get_mut(bag.0 as usize) else {
                continue;
            };
            // Mark first so cycles/shared bags are visited once.
            if entry.marked {
                continue;
            }
            entry.marked = true;

            children.clear();
            entry.object.children(&mut children);
            worklist.extend(children.iter().copied());
        }
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (i, slot) in self.entries.iter_mut().enumerate() {
            let Some(entry) = slot else {
                continue;
            };
            if entry.marked {
                entry.marked = false;
                continue;
            }

            if let Some(mut entry) = slot.take() {
                if let HeapObject::Package { tnum, payload } = &mut entry.object {
                    if let Some(finalizer) = self.finalizers.get(tnum) {
                        trace!("finalizing bag {} (tnum {})", i, tnum.raw());
                        finalizer(payload.as_mut());
                    }
                }
            }
            self.free_list.push(i as u32);
            freed += 1;
        }
        freed
    }

    fn adapt_threshold(&mut self, collected: usize, total_before: usize) {
        if total_before == 0 {
            return;
        }

        let ratio = collected as f64 / total_before as f64;
        if ratio < 0.25 {
            self.gc_threshold = (self.gc_threshold * 2).min(1_000_000);
        } else if ratio > 0.75 {
            self.gc_threshold = (self.gc_threshold / 2).max(MIN_GC_THRESHOLD)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, cell::Cell};

    use super::*;

    fn plist(items: Vec<Obj>) -> HeapObject {
        HeapObject::PList(items)
    }

    #[test]
    fn test_alloc_and_get() {
        let mut heap = KernelHeap::new();
        let bag = heap.alloc(HeapObject::String("abc".to_string()));
        match heap.get(bag) {
            HeapObject::String(s) => assert_eq!(s, "abc"),
            other => panic!("expected String, got {:?}", other),
        }
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn test_collect_frees_unreachable() {
        let mut heap = KernelHeap::new();
        for i in 0..100 {
            heap.alloc(plist(vec![Obj::Int(i)]));
        }
        assert_eq!(heap.live_count(), 100);

        assert_eq!(heap.collect(&[], &[]), 100);
        assert_eq!(heap.live_count(), 0);
        assert_eq!(heap.free_list.len(), 100);
    }

    #[test]
    fn test_collect_traces_nested_lists() {
        let mut heap = KernelHeap::new();
        let inner = heap.alloc(plist(vec![Obj::Int(2)]));
        let outer = heap.alloc(plist(vec![Obj::Int(1), Obj::Bag(inner)]));
        for _ in 0..10 {
            heap.alloc(plist(vec![]));
        }

        heap.collect(&[Obj::Bag(outer)], &[]);
        assert_eq!(heap.live_count(), 2);
        assert!(heap.is_live(inner));
        assert!(heap.is_live(outer));
    }

    #[test]
    fn test_collect_handles_cycles() {
        let mut heap = KernelHeap::new();
        let list = heap.alloc(plist(vec![]));
        if let HeapObject::PList(items) = heap.get_mut(list) {
            items.push(Obj::Bag(list));
        }

        heap.collect(&[], &[Obj::Bag(list)]);
        assert!(heap.is_live(list));

        heap.collect(&[], &[]);
        assert!(!heap.is_live(list));
    }

    #[test]
    fn test_free_list_reuse() {
        let mut heap = KernelHeap::new();
        heap.alloc(plist(vec![]));
        heap.alloc(plist(vec![]));
        heap.collect(&[], &[]);

        heap.alloc(plist(vec![]));
        assert_eq!(heap.entries.len(), 2);
    }

    thread_local! {
        static FINALIZED: Cell<usize> = const { Cell::new(0) };
    }

    fn count_finalized(payload: &mut dyn Any) {
        if payload.downcast_mut::<u32>().is_some() {
            FINALIZED.with(|count| count.set(count.get() + 1));
        }
    }

    #[test]
    fn test_sweep_runs_finalizers_for_package_bags() {
        let tnum = TNum(TNum::FIRST_PACKAGE.0 + 1);
        let mut heap = KernelHeap::new();
        heap.set_finalizer(tnum, count_finalized);

        let kept = heap.alloc(HeapObject::Package {
            tnum,
            payload: Box::new(1u32),
        });
        heap.alloc(HeapObject::Package {
            tnum,
            payload: Box::new(2u32),
        });
        heap.alloc(HeapObject::Package {
            tnum: TNum::FIRST_PACKAGE,
            payload: Box::new(3u32),
        });

        FINALIZED.with(|count| count.set(0));
        heap.collect(&[Obj::Bag(kept)], &[]);
        assert_eq!(FINALIZED.with(Cell::get), 1);
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn test_should_collect_respects_threshold_and_enabled() {
        let mut heap = KernelHeap::with_threshold(3);
        assert!(!heap.should_collect());
        for _ in 0..3 {
            heap.alloc(plist(vec![]));
        }
        assert!(heap.should_collect());
        heap.set_enabled(false);
        assert!(!heap.should_collect());
    }

    #[test]
    fn test_adaptive_threshold() {
        let mut heap = KernelHeap::with_threshold(MIN_GC_THRESHOLD);
        let roots: Vec<Obj> = (0..10)
            .map(|i| Obj::Bag(heap.alloc(plist(vec![Obj::Int(i)]))))
            .collect();
        heap.collect(&roots, &[]);
        assert_eq!(heap.threshold(), MIN_GC_THRESHOLD * 2);

        let mut heap = KernelHeap::with_threshold(1_000);
        for _ in 0..10 {
            heap.alloc(plist(vec![]));
        }
        heap.collect(&[], &[]);
        assert_eq!(heap.threshold(), 500);
    }

    #[test]
    #[should_panic(expected = "collected")]
    fn test_use_after_collect_panics() {
        let mut heap = KernelHeap::new();
        let bag = heap.alloc(plist(vec![]));
        heap.collect(&[], &[]);
        heap.get(bag);
    }
}
