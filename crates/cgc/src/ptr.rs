//! Gc<T> - the tracked, cycle-safe smart pointer
//!
//! A `Gc<T>` that lives on the stack (or anywhere outside a tracked object)
//! is a *root*; one created through the construction context and stored in a
//! tracked payload is a *heap edge*. Roots keep their target alive by
//! counting; edges contribute to liveness only through the mark traversal,
//! which is what makes cycles collectable.
//!
//! The typed raw payload address is cached alongside the handle. Payload
//! addresses are immutable after allocation, so the cache never desyncs for
//! a given target; retargeting stores both fields.
//!
//! # Safety contract
//!
//! Dereferencing and indexing are unchecked on the fast path, exactly like a
//! raw pointer: a null or out-of-range access is undefined behavior. Debug
//! builds assert on null. Mutating a payload through [`Gc::get`] is the
//! caller's aliasing responsibility; the collector itself never reads
//! payload memory.

use crate::heap::HeapShared;
use crate::object::handle::RawHandle;
use crate::object::record::ObjectRecord;
use crate::registry::EdgeSlot;
use std::any::TypeId;
use std::fmt;
use std::ops::{Add, AddAssign, Deref, Index, Sub, SubAssign};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

/// Tracked pointer whose liveness is managed by the collector.
///
/// Obtained from [`Heap::alloc`](crate::Heap::alloc),
/// [`Heap::alloc_array`](crate::Heap::alloc_array),
/// [`Ctor::edge`](crate::Ctor::edge) / [`Ctor::null_edge`](crate::Ctor::null_edge),
/// or by cloning/casting an existing handle.
///
/// ```
/// let heap = cgc::init().unwrap();
/// let n = heap.alloc(|_| 41u64);
/// assert_eq!(*n + 1, 42);
/// ```
pub struct Gc<T> {
    raw: RawHandle,
    ptr: AtomicPtr<T>,
}

// Payloads are shared across every handle that aliases them, so sending or
// sharing a handle is sharing the payload.
unsafe impl<T: Send + Sync> Send for Gc<T> {}
unsafe impl<T: Send + Sync> Sync for Gc<T> {}

impl<T> Gc<T> {
    pub(crate) fn from_root_parts(
        heap: Arc<HeapShared>,
        target: Option<NonNull<ObjectRecord>>,
        ptr: *mut T,
        counted: bool,
    ) -> Self {
        Self {
            raw: RawHandle::new_root(heap, target, counted),
            ptr: AtomicPtr::new(ptr),
        }
    }

    /// Root handle adopting the allocator-seeded reference count.
    pub(crate) unsafe fn adopt_root(heap: Arc<HeapShared>, record: NonNull<ObjectRecord>) -> Self {
        let ptr = record.as_ref().payload() as *mut T;
        Self::from_root_parts(heap, Some(record), ptr, true)
    }

    pub(crate) fn from_edge(
        slot: NonNull<EdgeSlot>,
        heap: NonNull<HeapShared>,
        ptr: *mut T,
    ) -> Self {
        Self {
            raw: RawHandle::new_edge(slot, heap),
            ptr: AtomicPtr::new(ptr),
        }
    }

    pub(crate) fn record(&self) -> Option<NonNull<ObjectRecord>> {
        self.raw.target()
    }

    /// Presence test on the cached address.
    ///
    /// A failed [`downcast`](Self::downcast) yields a handle that is null
    /// here while still tracking (and rooting) the original record.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.load(Ordering::Relaxed).is_null()
    }

    /// Raw payload address. Lock-free; no validity check.
    #[inline]
    pub fn get(&self) -> *mut T {
        self.ptr.load(Ordering::Acquire)
    }

    /// Retarget this handle at `src`'s target.
    ///
    /// On a root handle this performs decrement-old, store-new,
    /// increment-new; the sequence is not atomic as a unit, but the borrowed
    /// `src` is itself a live handle of the new target for the whole window
    /// (see DESIGN.md). On an edge handle the non-null store serializes with
    /// the collector on the registry mutex.
    pub fn set(&self, src: &Gc<T>) {
        self.raw.set_target(src.raw.target());
        self.ptr.store(src.get(), Ordering::Release);
    }

    /// Explicitly drop the reference, leaving a null handle.
    ///
    /// Clearing a root also schedules a full collection for the next
    /// allocation, so severing the last root into a subgraph reclaims it
    /// promptly.
    pub fn clear(&self) {
        self.raw.clear_target();
        self.ptr.store(std::ptr::null_mut(), Ordering::Release);
    }

    /// Aliasing cast: a root handle that tracks the same record but exposes
    /// `ptr` as its address. Building block for field pointers and casts.
    pub fn alias<U>(&self, ptr: *mut U) -> Gc<U> {
        Gc::from_root_parts(self.raw.heap_arc(), self.raw.target(), ptr, false)
    }

    /// Reinterpreting cast preserving the tracked record.
    pub fn cast<U>(&self) -> Gc<U> {
        self.alias(self.get() as *mut U)
    }

    /// Runtime-checked downcast against the allocation's element type.
    ///
    /// On mismatch the result has a null raw address but still tracks (and
    /// roots) the same record.
    ///
    /// ```
    /// let heap = cgc::init().unwrap();
    /// let n = heap.alloc(|_| 7u32);
    /// assert!(!n.downcast::<u32>().is_null());
    /// assert!(n.downcast::<u64>().is_null());
    /// ```
    pub fn downcast<U: 'static>(&self) -> Gc<U> {
        match self.raw.target() {
            Some(rec) if unsafe { rec.as_ref() }.type_id == TypeId::of::<U>() => {
                self.alias(self.get() as *mut U)
            }
            _ => self.alias(std::ptr::null_mut()),
        }
    }

    /// Handle aliasing the same record `count` elements away.
    ///
    /// Out-of-range arithmetic is undefined at the point of dereference; no
    /// bounds are checked here.
    pub fn offset(&self, count: isize) -> Gc<T> {
        let p = self.get();
        let shifted = if p.is_null() { p } else { p.wrapping_offset(count) };
        self.alias(shifted)
    }

    /// Element distance between two handles into the same allocation.
    pub fn offset_from(&self, other: &Gc<T>) -> isize {
        let size = std::mem::size_of::<T>();
        if size == 0 {
            return 0;
        }
        (self.get() as isize - other.get() as isize) / size as isize
    }
}

impl<T> Clone for Gc<T> {
    /// Cloning always produces a root handle, wherever the clone is stored;
    /// embedding edges in payloads goes through the construction context.
    fn clone(&self) -> Self {
        self.alias(self.get())
    }
}

impl<T> Deref for Gc<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        let p = self.get();
        debug_assert!(!p.is_null(), "dereferenced a null tracked pointer");
        unsafe { &*p }
    }
}

impl<T> Index<usize> for Gc<T> {
    type Output = T;

    /// Unchecked array indexing, matching the raw-pointer contract.
    ///
    /// ```
    /// let heap = cgc::init().unwrap();
    /// let arr = heap.alloc_array::<i32>(3);
    /// unsafe { *arr.get().add(1) = 5 };
    /// assert_eq!(arr[1], 5);
    /// ```
    #[inline]
    fn index(&self, index: usize) -> &T {
        let p = self.get();
        debug_assert!(!p.is_null(), "indexed a null tracked pointer");
        unsafe { &*p.add(index) }
    }
}

impl<T> Add<isize> for &Gc<T> {
    type Output = Gc<T>;

    fn add(self, count: isize) -> Gc<T> {
        self.offset(count)
    }
}

impl<T> Sub<isize> for &Gc<T> {
    type Output = Gc<T>;

    fn sub(self, count: isize) -> Gc<T> {
        self.offset(-count)
    }
}

impl<T> AddAssign<isize> for Gc<T> {
    /// Advance the cached address in place; the tracked record is unchanged.
    fn add_assign(&mut self, count: isize) {
        let p = self.ptr.load(Ordering::Relaxed);
        self.ptr
            .store(p.wrapping_offset(count), Ordering::Relaxed);
    }
}

impl<T> SubAssign<isize> for Gc<T> {
    fn sub_assign(&mut self, count: isize) {
        *self += -count;
    }
}

impl<T> PartialEq for Gc<T> {
    /// Address equality, like the raw pointers these stand in for.
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl<T> Eq for Gc<T> {}

impl<T> PartialOrd for Gc<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        (self.get() as usize).partial_cmp(&(other.get() as usize))
    }
}

impl<T> fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Gc").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::Heap;

    #[test]
    fn test_null_handle() {
        let heap = Heap::with_defaults();
        let h = heap.null::<u32>();
        assert!(h.is_null());
        assert!(h.get().is_null());
    }

    #[test]
    fn test_deref_and_get() {
        let heap = Heap::with_defaults();
        let n = heap.alloc(|_| 123u64);
        assert!(!n.is_null());
        assert_eq!(*n, 123);
        unsafe { *n.get() = 321 };
        assert_eq!(*n, 321);
    }

    #[test]
    fn test_clone_keeps_target_alive() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(|_| 1u32);
        let b = a.clone();
        drop(a);

        heap.collect();
        assert_eq!(heap.live_objects(), 1);
        assert_eq!(*b, 1);
    }

    #[test]
    fn test_set_and_clear() {
        let heap = Heap::with_defaults();
        let a = heap.alloc(|_| 10u32);
        let b = heap.alloc(|_| 20u32);

        let h = heap.null::<u32>();
        h.set(&a);
        assert_eq!(*h, 10);
        h.set(&b);
        assert_eq!(*h, 20);
        h.set(&h.clone());
        assert_eq!(*h, 20);

        h.clear();
        assert!(h.is_null());

        // Both objects stay rooted by their original handles.
        heap.collect();
        assert_eq!(heap.live_objects(), 2);
    }

    #[test]
    fn test_pointer_arithmetic() {
        let heap = Heap::with_defaults();
        let arr = heap.alloc_array::<i32>(4);
        for i in 0..4 {
            unsafe { *arr.get().add(i) = i as i32 * 10 };
        }

        let third = &arr + 2;
        assert_eq!(third[0], 20);
        assert_eq!(third.offset_from(&arr), 2);

        let back = &third - 2;
        assert_eq!(back, arr);

        let mut cursor = arr.clone();
        cursor += 1;
        assert_eq!(cursor[0], 10);
        cursor -= 1;
        assert_eq!(cursor, arr);
    }

    #[test]
    fn test_arithmetic_aliases_same_record() {
        let heap = Heap::with_defaults();
        let arr = heap.alloc_array::<i32>(8);
        let tail = arr.offset(7);
        drop(arr);

        // The offset handle still roots the allocation.
        heap.collect();
        assert_eq!(heap.live_objects(), 1);
        drop(tail);
        let stats = heap.collect();
        assert_eq!(stats.freed, 1);
    }

    #[test]
    fn test_cast_roundtrip() {
        let heap = Heap::with_defaults();
        let n = heap.alloc(|_| 0x1122_3344u32);
        let bytes = n.cast::<[u8; 4]>();
        assert_eq!(bytes.get() as usize, n.get() as usize);

        let back = bytes.cast::<u32>();
        assert_eq!(*back, 0x1122_3344);
    }

    #[test]
    fn test_downcast_mismatch_still_roots() {
        let heap = Heap::with_defaults();
        let n = heap.alloc(|_| 5u32);
        let wrong = n.downcast::<i64>();
        assert!(wrong.is_null());
        drop(n);

        // The failed downcast still counts as a root of the record.
        heap.collect();
        assert_eq!(heap.live_objects(), 1);
        drop(wrong);
        assert_eq!(heap.collect().freed, 1);
    }

    #[test]
    fn test_comparisons() {
        let heap = Heap::with_defaults();
        let arr = heap.alloc_array::<u8>(2);
        let first = arr.offset(0);
        let second = arr.offset(1);

        assert_eq!(arr, first);
        assert_ne!(first, second);
        assert!(first < second);
    }
}
