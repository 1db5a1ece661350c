//! # CGC - Cycle-Safe Tracing Garbage Collector
//!
//! CGC is a mark-and-sweep collector for Rust applications that need a
//! single smart-pointer type able to both act as an ordinary pointer and
//! participate safely in reference cycles, with no manual cycle-breaking.
//!
//! ## Overview
//!
//! - **One pointer type**: [`Gc<T>`] is used on the stack, in globals, and
//!   inside tracked objects. Freestanding handles are *roots* and count;
//!   handles embedded through the construction context are *heap edges* and
//!   are discovered by traversal, which is what makes cycles collectable.
//! - **Explicit context**: a [`Heap`] value owns all collector state. No
//!   globals, no thread-locals, no exit hooks; clone it to share it, drain
//!   it with [`Heap::shutdown`].
//! - **Minimal locking**: one registry mutex guards the live set, edge-slot
//!   creation and the locked collection phases. Dereferences, root
//!   decrements and positive-count increments are lock-free.
//! - **Reentrancy-safe finalization**: destructors run with the lock
//!   released, so they may allocate tracked objects or trigger further
//!   collections.
//!
//! ## Quick Start
//!
//! ```rust
//! use cgc::Gc;
//!
//! struct Node {
//!     next: Gc<Node>,
//!     value: u64,
//! }
//!
//! fn main() -> Result<(), cgc::CgcError> {
//!     let heap = cgc::init()?;
//!
//!     // Build a two-node cycle through heap edges.
//!     let a = heap.alloc(|c| Node { next: c.null_edge(), value: 1 });
//!     let b = heap.alloc(|c| Node { next: c.edge(&a), value: 2 });
//!     a.next.set(&b);
//!
//!     // Drop the roots; the cycle is unreachable despite the loop.
//!     drop(a);
//!     drop(b);
//!
//!     let stats = heap.collect();
//!     assert_eq!(stats.freed, 2);
//!     assert_eq!(heap.live_objects(), 0);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Mutator Threads                        │
//! │   Gc<T> roots ──── count ────►┐                          │
//! │   Gc<T> edges ── edge slots ──┤   lock-free fast paths   │
//! └───────────────────────────────┼──────────────────────────┘
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Heap (shared context)                    │
//! │  registry mutex: live set + edge arena + trigger state   │
//! └───────────────────────────────┬──────────────────────────┘
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │   Collector (runs on the triggering thread)              │
//! │   Seeding ─► Marking ─► Partitioning   (mutex held)      │
//! │   Finalizing                           (mutex released)  │
//! │   Freeing                              (mutex re-held)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Collections are triggered by an adaptive allocation countdown
//! (recalibrated to `max(2 * live, floor)` after every cycle), by explicit
//! [`Gc::clear`] of a root, by [`Heap::collect`], and by the shutdown drain.
//!
//! ## Safety
//!
//! CGC uses `unsafe` internally and exposes a raw-pointer-flavored surface.
//! Users must follow these rules:
//!
//! 1. **Null and out-of-range access is undefined**: dereference and
//!    indexing are unchecked on the fast path (debug builds assert on
//!    null). Test with [`Gc::is_null`] where a handle may be empty.
//! 2. **Edges belong to their object**: handles returned by
//!    [`Ctor::edge`] / [`Ctor::null_edge`] must be stored inside the object
//!    being constructed. A smuggled-out edge does not root anything.
//! 3. **Payload mutation through [`Gc::get`] is the caller's aliasing
//!    responsibility**; the collector never reads payload memory.
//! 4. **Destructors must not panic**: a panicking destructor during
//!    finalization aborts the process.
//!
//! ## Thread Safety
//!
//! [`Heap`] and [`Gc<T>`] (for `T: Send + Sync`) are `Send + Sync`.
//! Allocation and collection may run concurrently from any thread; a
//! collection runs synchronously on the thread that triggered it while
//! other threads keep using the lock-free pointer paths.
//!
//! ## Limitations
//!
//! - **Deferred reclamation**: unreachable objects are destroyed at the
//!   next collection, not at the last handle drop. Subgraphs needing prompt
//!   destruction belong to an ordinary reference-counted pointer family;
//!   mixing the two on the same object is not supported.
//! - **Root handles inside payloads leak**: a cloned root stored inside a
//!   tracked object keeps the heap context alive through its own objects
//!   (the usual `Arc` cycle shape). Use construction-context edges for
//!   fields.
//! - **Zero-sized array elements** are not supported by
//!   [`Heap::alloc_array`].
//!
//! ## Modules
//!
//! - [`allocator`]: combined-block allocation and the construction context
//! - [`config`]: collector configuration and validation
//! - [`error`]: error types
//! - [`gc`]: collection cycle states, reasons, and the cycle itself
//! - [`heap`]: the explicit collector context
//! - [`logging`]: cycle event reporting
//! - [`ptr`]: the tracked pointer type
//! - [`stats`]: counters and per-cycle summaries
//! - [`util`]: typed-index utilities

pub mod allocator;
pub mod config;
pub mod error;
pub mod gc;
pub mod heap;
pub mod logging;
pub mod ptr;
pub mod stats;
pub mod util;

mod object;
mod registry;

// Re-export main types for convenience
pub use allocator::Ctor;
pub use config::{ConfigError, GcConfig};
pub use error::{CgcError, Result};
pub use gc::{GcReason, GcState};
pub use heap::Heap;
pub use logging::{GcEvent, GcLogger};
pub use ptr::Gc;
pub use stats::{CycleStats, GcStats, StatsSnapshot};

/// CGC version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize a heap with the default configuration
///
/// # Examples
///
/// ```rust
/// let heap = cgc::init()?;
/// let n = heap.alloc(|_| 1u32);
/// assert_eq!(*n, 1);
/// # Ok::<(), cgc::CgcError>(())
/// ```
pub fn init() -> Result<Heap> {
    Heap::new(GcConfig::default())
}

/// Initialize a heap with a custom configuration
///
/// # Examples
///
/// ```rust
/// use cgc::GcConfig;
///
/// let config = GcConfig {
///     initial_trigger: 256,
///     ..Default::default()
/// };
/// let heap = cgc::init_with_config(config)?;
/// # Ok::<(), cgc::CgcError>(())
/// ```
pub fn init_with_config(config: GcConfig) -> Result<Heap> {
    Heap::new(config)
}
