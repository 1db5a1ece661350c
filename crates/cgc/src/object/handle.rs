//! Raw Handle - the non-generic base of every tracked pointer
//!
//! A handle's kind is decided exactly once, at construction, and never
//! changes:
//!
//! - `Root` handles live outside any tracked object (stack, globals, or
//!   collections the collector does not manage). Their liveness contributes
//!   to their target's survival through `root_refs` counting.
//! - `Edge` handles live inside a tracked object's payload and are created
//!   only through the construction context. They never touch any count;
//!   their contribution to liveness is discovered by traversal during mark.
//!   Their target lives in a registry-owned edge slot so the collector can
//!   walk an object's outgoing edges without touching payload memory.
//!
//! The counting protocol follows the lock discipline described in the crate
//! docs: root increments from a positive count are a lock-free CAS loop,
//! increments from exactly zero serialize with the collector's seed phase on
//! the registry mutex, and decrements are always lock-free.

use crate::heap::HeapShared;
use crate::object::record::ObjectRecord;
use crate::registry::EdgeSlot;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Non-generic pointer base; see module docs for the kind semantics.
pub(crate) enum RawHandle {
    /// Freestanding handle; owns a share of the heap context.
    Root {
        /// Current target record address, 0 when null
        target: AtomicUsize,
        heap: Arc<HeapShared>,
    },
    /// Handle embedded in a tracked payload. The heap strictly outlives
    /// every edge (payloads are freed only by the heap), so a non-owning
    /// pointer is enough and avoids keeping the heap alive through its own
    /// objects.
    Edge {
        slot: NonNull<EdgeSlot>,
        heap: NonNull<HeapShared>,
    },
}

impl RawHandle {
    /// Build a root handle. `counted` tells whether the target's root count
    /// already accounts for this handle (the allocator seeds the count
    /// before the payload initializer runs).
    pub(crate) fn new_root(
        heap: Arc<HeapShared>,
        target: Option<NonNull<ObjectRecord>>,
        counted: bool,
    ) -> Self {
        let addr = target.map_or(0, |t| t.as_ptr() as usize);
        if let Some(rec) = target {
            if !counted {
                inc_root(&heap, rec);
            }
        }
        RawHandle::Root {
            target: AtomicUsize::new(addr),
            heap,
        }
    }

    /// Build an edge handle over an already-linked slot.
    pub(crate) fn new_edge(slot: NonNull<EdgeSlot>, heap: NonNull<HeapShared>) -> Self {
        RawHandle::Edge { slot, heap }
    }

    /// Current target record, if any. Lock-free for both kinds.
    #[inline]
    pub(crate) fn target(&self) -> Option<NonNull<ObjectRecord>> {
        let addr = match self {
            RawHandle::Root { target, .. } => target.load(Ordering::Acquire),
            RawHandle::Edge { slot, .. } => {
                unsafe { slot.as_ref() }.target.load(Ordering::Acquire)
            }
        };
        NonNull::new(addr as *mut ObjectRecord)
    }

    /// Shared heap state this handle belongs to.
    #[inline]
    pub(crate) fn heap_shared(&self) -> &HeapShared {
        match self {
            RawHandle::Root { heap, .. } => heap,
            RawHandle::Edge { heap, .. } => unsafe { heap.as_ref() },
        }
    }

    /// Owning reference to the heap context, for spawning root handles.
    pub(crate) fn heap_arc(&self) -> Arc<HeapShared> {
        match self {
            RawHandle::Root { heap, .. } => Arc::clone(heap),
            RawHandle::Edge { heap, .. } => unsafe { heap.as_ref() }
                .weak_self
                .upgrade()
                .expect("heap context alive while edge handles exist"),
        }
    }

    /// Retarget this handle.
    ///
    /// Root path: decrement-old, store-new, increment-new. The sequence is
    /// deliberately not atomic as a unit; see DESIGN.md for why the borrowed
    /// source bounds the window in this API.
    ///
    /// Edge path: a non-null store holds the registry mutex because the
    /// collector's mark phase walks the same slots; a null store only needs
    /// release ordering.
    pub(crate) fn set_target(&self, new: Option<NonNull<ObjectRecord>>) {
        let new_addr = new.map_or(0, |n| n.as_ptr() as usize);
        match self {
            RawHandle::Root { target, heap } => {
                let old = target.load(Ordering::Acquire);
                if old == new_addr {
                    return;
                }
                if let Some(old_rec) = NonNull::new(old as *mut ObjectRecord) {
                    dec_root(old_rec);
                }
                target.store(new_addr, Ordering::Release);
                if let Some(new_rec) = new {
                    inc_root(heap, new_rec);
                }
            }
            RawHandle::Edge { slot, heap } => {
                let slot = unsafe { slot.as_ref() };
                if new_addr != 0 {
                    let _registry = unsafe { heap.as_ref() }.registry.lock();
                    slot.target.store(new_addr, Ordering::Release);
                } else {
                    slot.target.store(0, Ordering::Release);
                }
            }
        }
    }

    /// Explicitly drop the reference (reset). Unlike a plain `Drop`, an
    /// explicit root removal also flags a full collection for the next
    /// allocation.
    pub(crate) fn clear_target(&self) {
        match self {
            RawHandle::Root { target, heap } => {
                let old = target.swap(0, Ordering::AcqRel);
                if let Some(old_rec) = NonNull::new(old as *mut ObjectRecord) {
                    dec_root(old_rec);
                    heap.collect_pending.store(true, Ordering::Release);
                }
            }
            RawHandle::Edge { slot, .. } => {
                unsafe { slot.as_ref() }.target.store(0, Ordering::Release);
            }
        }
    }
}

impl Drop for RawHandle {
    fn drop(&mut self) {
        match self {
            RawHandle::Root { target, .. } => {
                let old = *target.get_mut();
                if let Some(rec) = NonNull::new(old as *mut ObjectRecord) {
                    dec_root(rec);
                }
            }
            RawHandle::Edge { slot, .. } => {
                // The slot outlives the handle (it is recycled only when the
                // owning object is freed), so nulling it is always safe.
                unsafe { slot.as_ref() }.target.store(0, Ordering::Release);
            }
        }
    }
}

/// Increment `root_refs`, acquiring the registry mutex only when going
/// 0 -> 1: the collector's seed phase reads "root count == 0" under that
/// lock as its non-root criterion, and a pointer coming alive concurrently
/// with a collection must not be missed.
pub(crate) fn inc_root(heap: &HeapShared, record: NonNull<ObjectRecord>) {
    let refs = unsafe { &record.as_ref().root_refs };
    let mut count = refs.load(Ordering::Acquire);
    while count != 0 {
        match refs.compare_exchange_weak(
            count,
            count + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return,
            Err(actual) => count = actual,
        }
    }
    // count == 0: the collector may be examining this object; hold the lock.
    let _registry = heap.registry.lock();
    refs.fetch_add(1, Ordering::Relaxed);
}

/// Decrement `root_refs`. Never needs the mutex: decrementing cannot
/// resurrect a dead object, and a sweep that already snapshotted liveness is
/// unaffected by a later decrement.
#[inline]
pub(crate) fn dec_root(record: NonNull<ObjectRecord>) {
    unsafe { &record.as_ref().root_refs }.fetch_sub(1, Ordering::Relaxed);
}
