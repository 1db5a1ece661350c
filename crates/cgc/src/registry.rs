//! Registry - live-object set and edge arena
//!
//! Everything the registry mutex guards lives here:
//! - the insertion-ordered live set of object records
//! - the edge-slot arena (one slot per embedded edge handle) with a free
//!   list, so slot addresses stay stable while the arena grows
//! - the map from object identity to the growable list of its edge slots
//!
//! The per-object edge lists replace an intrusive linked list threaded
//! through payload memory: slots are registry-owned, addressed by typed
//! index, and recycled only when their owning object is freed. The mark
//! phase walks `edge_targets` while holding the mutex; mutators serialize
//! slot creation and non-null retargeting on the same mutex, while null
//! retargeting and slot reads stay lock-free on the slot's atomic.

use crate::define_idx;
use crate::object::record::ObjectRecord;
use crate::util::index_vec::IndexVec;
use rustc_hash::FxHashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

define_idx!(EdgeId);

/// One embedded edge handle's target, 0 when null.
///
/// Boxed by the arena so its address survives arena growth; edge handles
/// and the collector reach it lock-free.
pub(crate) struct EdgeSlot {
    pub(crate) target: AtomicUsize,
}

/// Mutex-guarded registry core. Owned by the heap context; all access goes
/// through `HeapShared::registry`.
pub(crate) struct Registry {
    /// Every live object record, in registration order
    live: Vec<NonNull<ObjectRecord>>,
    /// Edge-slot arena
    slots: IndexVec<EdgeId, Box<EdgeSlot>>,
    /// Recycled slot ids
    free_slots: Vec<EdgeId>,
    /// Object identity -> ids of the edge slots embedded in its payload
    edges_by_object: FxHashMap<usize, Vec<EdgeId>>,
}

// Raw record pointers are only dereferenced under the mutex or through the
// handle protocol; the registry itself moves freely between threads.
unsafe impl Send for Registry {}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            live: Vec::new(),
            slots: IndexVec::new(),
            free_slots: Vec::new(),
            edges_by_object: FxHashMap::default(),
        }
    }

    /// Number of live objects
    #[inline]
    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Iterate the live set in registration order
    #[inline]
    pub(crate) fn live(&self) -> &[NonNull<ObjectRecord>] {
        &self.live
    }

    /// Add a freshly allocated record to the live set
    pub(crate) fn register(&mut self, record: NonNull<ObjectRecord>) {
        debug_assert!(
            !self.live.contains(&record),
            "record registered twice: {:#x}",
            record.as_ptr() as usize
        );
        self.live.push(record);
    }

    /// Remove a record that failed construction, releasing any edge slots
    /// its partial payload created. Searches from the back: the failed
    /// record is always near the end of the live set.
    pub(crate) fn deregister_rollback(&mut self, record: NonNull<ObjectRecord>) {
        if let Some(pos) = self.live.iter().rposition(|r| *r == record) {
            self.live.remove(pos);
        }
        self.release_edges(record.as_ptr() as usize);
    }

    /// Replace the live set wholesale (collector partition step)
    pub(crate) fn replace_live(&mut self, live: Vec<NonNull<ObjectRecord>>) {
        self.live = live;
    }

    /// Take the live set out for partitioning
    pub(crate) fn take_live(&mut self) -> Vec<NonNull<ObjectRecord>> {
        std::mem::take(&mut self.live)
    }

    /// Create an edge slot for `owner` with an initial target address
    /// (0 for null). Returns a stable pointer to the slot.
    pub(crate) fn create_slot(&mut self, owner: usize, target: usize) -> NonNull<EdgeSlot> {
        let id = match self.free_slots.pop() {
            Some(id) => {
                self.slots[id].target.store(target, Ordering::Release);
                id
            }
            None => self.slots.push(Box::new(EdgeSlot {
                target: AtomicUsize::new(target),
            })),
        };
        self.edges_by_object.entry(owner).or_default().push(id);
        NonNull::from(self.slots[id].as_ref())
    }

    /// Current targets of `owner`'s edges, nulls included as 0
    pub(crate) fn edge_targets(&self, owner: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges_by_object
            .get(&owner)
            .into_iter()
            .flatten()
            .map(move |id| self.slots[*id].target.load(Ordering::Acquire))
    }

    /// Return all of `owner`'s slots to the free list
    pub(crate) fn release_edges(&mut self, owner: usize) {
        if let Some(ids) = self.edges_by_object.remove(&owner) {
            for id in ids {
                self.slots[id].target.store(0, Ordering::Relaxed);
                self.free_slots.push(id);
            }
        }
    }

    /// Total slots ever created minus recycled ones, for diagnostics
    pub(crate) fn edge_slots_in_use(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }
}
