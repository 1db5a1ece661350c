//! Allocator - combined-block allocation and the construction context
//!
//! Allocation builds one contiguous `[header|payload]` block, registers the
//! header with a seeded root count, and only then runs the caller's
//! initializer. The seeded count keeps the under-construction object alive
//! if the initializer allocates and that allocation triggers a collection.
//!
//! The initializer receives a [`Ctor`] construction context. Handles created
//! through the context are heap edges of the object being built; this is the
//! explicit replacement for classifying handles by the address range of a
//! thread-local "object under construction".
//!
//! A panicking initializer unwinds through two guards: the inner one
//! destroys the constructed array prefix in reverse order, the outer one
//! deregisters the record, releases any edge slots the partial construction
//! injected, and frees the block. The partial object is never observable by
//! a collection.

use crate::gc::GcReason;
use crate::heap::HeapShared;
use crate::object::record::{self, ObjectRecord};
use crate::ptr::Gc;
use std::alloc::Layout;
use std::any::TypeId;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Construction context for the object currently being initialized.
///
/// Passed by reference into the initializer closure of
/// [`Heap::alloc`](crate::Heap::alloc); cannot escape it.
pub struct Ctor<'h> {
    heap: &'h HeapShared,
    owner: NonNull<ObjectRecord>,
}

impl Ctor<'_> {
    /// Create a heap-edge field targeting whatever `target` points at.
    ///
    /// The returned handle belongs to the object under construction and must
    /// be stored inside it; it does not contribute to the target's root
    /// count.
    pub fn edge<U>(&self, target: &Gc<U>) -> Gc<U> {
        let addr = target.record().map_or(0, |r| r.as_ptr() as usize);
        let slot = {
            let mut registry = self.heap.registry.lock();
            registry.create_slot(self.owner.as_ptr() as usize, addr)
        };
        Gc::from_edge(slot, NonNull::from(self.heap), target.get())
    }

    /// Create a null heap-edge field, to be retargeted later with
    /// [`Gc::set`].
    pub fn null_edge<U>(&self) -> Gc<U> {
        let slot = {
            let mut registry = self.heap.registry.lock();
            registry.create_slot(self.owner.as_ptr() as usize, 0)
        };
        Gc::from_edge(slot, NonNull::from(self.heap), std::ptr::null_mut())
    }
}

/// Rollback for a registered record whose payload construction failed.
struct AllocRollback<'h> {
    heap: &'h HeapShared,
    record: NonNull<ObjectRecord>,
    armed: bool,
}

impl Drop for AllocRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut registry = self.heap.registry.lock();
            registry.deregister_rollback(self.record);
        }
        unsafe { record::free_block(self.record) };
    }
}

/// Rollback destroying an array's constructed prefix in reverse order.
struct PrefixRollback<T> {
    base: *mut T,
    constructed: usize,
    armed: bool,
}

impl<T> Drop for PrefixRollback<T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for i in (0..self.constructed).rev() {
            unsafe { std::ptr::drop_in_place(self.base.add(i)) };
        }
    }
}

impl HeapShared {
    /// Allocate and initialize a single tracked object.
    pub(crate) fn alloc_value<T, F>(self: &Arc<Self>, init: F) -> Gc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&Ctor<'_>) -> T,
    {
        self.maybe_collect();

        let record = record::allocate_block(
            Layout::new::<T>(),
            record::drop_payload::<T>,
            TypeId::of::<T>(),
        );
        self.register_seeded(record);

        let mut rollback = AllocRollback {
            heap: self,
            record,
            armed: true,
        };

        let ctor = Ctor {
            heap: self,
            owner: record,
        };
        let value = init(&ctor);
        unsafe { (record.as_ref().payload() as *mut T).write(value) };

        rollback.armed = false;
        self.note_allocated(record);
        unsafe { Gc::adopt_root(Arc::clone(self), record) }
    }

    /// Allocate and default-construct `count` elements.
    ///
    /// Zero-sized element types are rejected: the record stores only the
    /// payload extent, so an element count could not be recovered for
    /// teardown.
    pub(crate) fn alloc_array<T>(self: &Arc<Self>, count: usize) -> Gc<T>
    where
        T: Default + Send + Sync + 'static,
    {
        assert!(
            std::mem::size_of::<T>() != 0,
            "alloc_array does not support zero-sized element types"
        );

        self.maybe_collect();

        let layout = Layout::array::<T>(count).expect("array layout overflow");
        let record = record::allocate_block(
            layout,
            record::drop_array_payload::<T>,
            TypeId::of::<T>(),
        );
        self.register_seeded(record);

        let mut rollback = AllocRollback {
            heap: self,
            record,
            armed: true,
        };

        let base = unsafe { record.as_ref() }.payload() as *mut T;
        let mut prefix = PrefixRollback {
            base,
            constructed: 0,
            armed: true,
        };
        for i in 0..count {
            unsafe { base.add(i).write(T::default()) };
            prefix.constructed = i + 1;
        }
        prefix.armed = false;

        rollback.armed = false;
        self.note_allocated(record);
        unsafe { Gc::adopt_root(Arc::clone(self), record) }
    }

    /// Register a fresh record with its root count seeded for the handle
    /// the allocation will return.
    fn register_seeded(&self, record: NonNull<ObjectRecord>) {
        unsafe { record.as_ref() }
            .root_refs
            .store(1, Ordering::Relaxed);
        let mut registry = self.registry.lock();
        registry.register(record);
    }

    fn note_allocated(&self, record: NonNull<ObjectRecord>) {
        if self.config.stats_enabled {
            self.stats
                .record_allocation(unsafe { record.as_ref() }.block_size());
        }
    }

    /// Countdown trigger check, run before each allocation. Best-effort by
    /// design; a collection already in flight absorbs the trigger.
    fn maybe_collect(&self) {
        let expired = self.countdown.fetch_sub(1, Ordering::Relaxed) <= 0;
        if self.collecting.load(Ordering::Acquire) != 0 {
            return;
        }
        if self.collect_pending.swap(false, Ordering::AcqRel) {
            self.collect_with_reason(GcReason::RootCleared);
        } else if expired {
            self.collect_with_reason(GcReason::Threshold);
        }
    }
}
