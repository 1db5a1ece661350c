//! Object Record - Metadata for GC-managed objects
//!
//! Block layout:
//! ┌─────────────────────────────────────────┐
//! │          ObjectRecord (header)          │
//! ├─────────────────────────────────────────┤
//! │       (alignment padding, if any)       │
//! ├─────────────────────────────────────────┤
//! │             payload bytes               │
//! └─────────────────────────────────────────┘
//!
//! The record and the payload live in one contiguous block from the global
//! allocator. The destructor callback receives the `[payload, end)` byte
//! range, which makes the payload size implicit and keeps pointer casting
//! out of the call sites.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::any::TypeId;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Destructor callback over a payload byte range. Must not unwind.
pub(crate) type DestructorFn = unsafe fn(*mut u8, *mut u8);

/// Allocation header for one managed object
///
/// Created by the allocator, mutated by handle operations (root count) and
/// the collector (mark bit), destroyed and freed only by the collector.
pub(crate) struct ObjectRecord {
    /// Start of the managed payload
    payload: *mut u8,
    /// One past the end of the managed payload
    end: *mut u8,
    /// Destroys the payload in place, exactly once
    destructor: DestructorFn,
    /// Layout of the whole block (header + padding + payload), for freeing
    layout: Layout,
    /// Element type of the payload, for checked downcasts
    pub(crate) type_id: TypeId,
    /// Live root handles referencing this object
    ///
    /// Nonzero means the object must survive the next collection.
    pub(crate) root_refs: AtomicI32,
    /// Reachability flag, mutated only inside collector-held critical
    /// sections
    mark: AtomicBool,
}

impl ObjectRecord {
    /// Start of the managed payload
    #[inline]
    pub(crate) fn payload(&self) -> *mut u8 {
        self.payload
    }

    /// One past the end of the managed payload
    #[inline]
    pub(crate) fn end(&self) -> *mut u8 {
        self.end
    }

    /// Payload size in bytes
    #[inline]
    pub(crate) fn payload_len(&self) -> usize {
        self.end as usize - self.payload as usize
    }

    /// Whole block size in bytes (header included)
    #[inline]
    pub(crate) fn block_size(&self) -> usize {
        self.layout.size()
    }

    /// Address identity of this record
    #[inline]
    pub(crate) fn addr(&self) -> usize {
        self as *const ObjectRecord as usize
    }

    #[inline]
    pub(crate) fn is_marked(&self) -> bool {
        self.mark.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_marked(&self, marked: bool) {
        self.mark.store(marked, Ordering::Relaxed);
    }

    /// Run the destructor over the payload range.
    ///
    /// # Safety
    /// The payload must be fully constructed and not yet destroyed; callers
    /// must guarantee exactly one invocation per record.
    pub(crate) unsafe fn run_destructor(&self) {
        (self.destructor)(self.payload, self.end);
    }
}

/// Allocate one combined `[header|payload]` block and initialize the header.
///
/// The payload is left uninitialized; the root count starts at zero. Memory
/// exhaustion goes through `handle_alloc_error`, the global allocator's OOM
/// path, untouched.
pub(crate) fn allocate_block(
    payload_layout: Layout,
    destructor: DestructorFn,
    type_id: TypeId,
) -> NonNull<ObjectRecord> {
    let (block_layout, offset) = Layout::new::<ObjectRecord>()
        .extend(payload_layout)
        .expect("object layout overflow");
    let block_layout = block_layout.pad_to_align();

    unsafe {
        let block = alloc(block_layout);
        if block.is_null() {
            handle_alloc_error(block_layout);
        }

        let payload = block.add(offset);
        let record = block as *mut ObjectRecord;
        record.write(ObjectRecord {
            payload,
            end: payload.add(payload_layout.size()),
            destructor,
            layout: block_layout,
            type_id,
            root_refs: AtomicI32::new(0),
            mark: AtomicBool::new(false),
        });

        NonNull::new_unchecked(record)
    }
}

/// Free the block backing `record`.
///
/// # Safety
/// `record` must come from [`allocate_block`], the payload destructor must
/// already have run (or the payload must never have been constructed), and
/// no handle may touch the record afterwards.
pub(crate) unsafe fn free_block(record: NonNull<ObjectRecord>) {
    let layout = record.as_ref().layout;
    dealloc(record.as_ptr() as *mut u8, layout);
}

/// Destructor thunk for a single `T` payload.
///
/// # Safety
/// `start` must point at a fully constructed `T`.
pub(crate) unsafe fn drop_payload<T>(start: *mut u8, _end: *mut u8) {
    std::ptr::drop_in_place(start as *mut T);
}

/// Destructor thunk for a `[T; n]`-shaped payload.
///
/// Destroys elements in reverse construction order. The element count is
/// recovered from the byte range, which is why zero-sized element types are
/// rejected at allocation time.
///
/// # Safety
/// `[start, end)` must cover a whole number of fully constructed `T`s.
pub(crate) unsafe fn drop_array_payload<T>(start: *mut u8, end: *mut u8) {
    let size = std::mem::size_of::<T>();
    if size == 0 {
        return;
    }
    let base = start as *mut T;
    let count = (end as usize - start as usize) / size;
    for i in (0..count).rev() {
        std::ptr::drop_in_place(base.add(i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    // === Layout Tests ===

    #[test]
    fn test_block_layout_alignment() {
        let record = allocate_block(
            Layout::new::<u64>(),
            drop_payload::<u64>,
            TypeId::of::<u64>(),
        );
        unsafe {
            let r = record.as_ref();
            assert_eq!(r.payload() as usize % std::mem::align_of::<u64>(), 0);
            assert_eq!(r.payload_len(), 8);
            assert!(r.block_size() >= std::mem::size_of::<ObjectRecord>() + 8);
            assert_eq!(r.root_refs.load(Ordering::Relaxed), 0);
            assert!(!r.is_marked());
            free_block(record);
        }
    }

    #[test]
    fn test_high_alignment_payload() {
        #[repr(align(64))]
        struct Aligned([u8; 64]);

        let record = allocate_block(
            Layout::new::<Aligned>(),
            drop_payload::<Aligned>,
            TypeId::of::<Aligned>(),
        );
        unsafe {
            assert_eq!(record.as_ref().payload() as usize % 64, 0);
            free_block(record);
        }
    }

    #[test]
    fn test_empty_array_payload() {
        let record = allocate_block(
            Layout::array::<u32>(0).unwrap(),
            drop_array_payload::<u32>,
            TypeId::of::<u32>(),
        );
        unsafe {
            assert_eq!(record.as_ref().payload_len(), 0);
            // Destructor over an empty range is a no-op.
            record.as_ref().run_destructor();
            free_block(record);
        }
    }

    // === Mark Bit Tests ===

    #[test]
    fn test_mark_operations() {
        let record = allocate_block(
            Layout::new::<u32>(),
            drop_payload::<u32>,
            TypeId::of::<u32>(),
        );
        unsafe {
            let r = record.as_ref();
            assert!(!r.is_marked());
            r.set_marked(true);
            assert!(r.is_marked());
            r.set_marked(false);
            assert!(!r.is_marked());
            free_block(record);
        }
    }

    // === Destructor Tests ===

    #[test]
    fn test_single_destructor_runs_once() {
        struct Probe(Arc<AtomicUsize>);
        impl Drop for Probe {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let record = allocate_block(
            Layout::new::<Probe>(),
            drop_payload::<Probe>,
            TypeId::of::<Probe>(),
        );
        unsafe {
            (record.as_ref().payload() as *mut Probe).write(Probe(drops.clone()));
            record.as_ref().run_destructor();
            free_block(record);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_array_destructor_reverse_order() {
        struct Ordered {
            id: usize,
            log: Arc<Mutex<Vec<usize>>>,
        }
        impl Drop for Ordered {
            fn drop(&mut self) {
                self.log.lock().unwrap().push(self.id);
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let record = allocate_block(
            Layout::array::<Ordered>(4).unwrap(),
            drop_array_payload::<Ordered>,
            TypeId::of::<Ordered>(),
        );
        unsafe {
            let base = record.as_ref().payload() as *mut Ordered;
            for id in 0..4 {
                base.add(id).write(Ordered {
                    id,
                    log: log.clone(),
                });
            }
            record.as_ref().run_destructor();
            free_block(record);
        }
        assert_eq!(*log.lock().unwrap(), vec![3, 2, 1, 0]);
    }
}
