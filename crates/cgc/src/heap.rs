//! Heap - the explicit collector context
//!
//! One `Heap` value is one collector instance: its registry, trigger state,
//! statistics and logger all live behind a shared, cheaply-cloneable
//! context. There is no process-global state and no exit hook; construct
//! the context at startup, pass it to allocation sites, and drain it with
//! [`Heap::shutdown`]. Dropping the last handle to the shared state runs a
//! final drain as well, so edge-only garbage never outlives the context.

use crate::allocator::Ctor;
use crate::config::GcConfig;
use crate::error::{CgcError, Result};
use crate::gc::{GcReason, GcState};
use crate::logging::{GcEvent, GcLogger};
use crate::ptr::Gc;
use crate::registry::Registry;
use crate::stats::{CycleStats, GcStats, StatsSnapshot};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Shared collector state. Public API goes through [`Heap`]; handles keep
/// this alive (roots) or borrow it (edges).
pub(crate) struct HeapShared {
    /// The one mutex: live set, edge arena, root 0<->1 transitions, locked
    /// collection phases
    pub(crate) registry: Mutex<Registry>,
    /// Allocations remaining until an automatic collection
    pub(crate) countdown: AtomicI64,
    /// Set by explicit root removal; consumed by the next allocation
    pub(crate) collect_pending: AtomicBool,
    /// Depth of collection runs in flight (reentrant runs included)
    pub(crate) collecting: AtomicUsize,
    /// Current GcState, for observers
    pub(crate) state: AtomicU8,
    /// Completed plus in-flight cycle count
    pub(crate) cycles: AtomicU64,
    pub(crate) config: GcConfig,
    pub(crate) stats: GcStats,
    pub(crate) logger: GcLogger,
    /// Lets edge handles mint owning references when cloned into roots
    pub(crate) weak_self: Weak<HeapShared>,
}

impl Drop for HeapShared {
    fn drop(&mut self) {
        // The last owning reference is gone, so no root handle can remain;
        // everything still registered is unrooted and a final drain frees
        // it.
        self.collect_with_reason(GcReason::Shutdown);
        let remaining = self.registry.lock().live_count();
        if remaining > 0 {
            log::warn!("heap context dropped with {remaining} objects still registered");
        }
    }
}

/// Explicit collector context; see the crate docs for the full picture.
///
/// Cloning is cheap (shared state behind `Arc`) and the intended way to hand
/// the heap to other threads.
pub struct Heap {
    pub(crate) shared: Arc<HeapShared>,
}

impl Heap {
    /// Create a heap with the given configuration.
    ///
    /// # Errors
    /// Returns [`CgcError::Configuration`] when the configuration fails
    /// validation.
    pub fn new(config: GcConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| CgcError::Configuration(e.to_string()))?;

        let shared = Arc::new_cyclic(|weak| HeapShared {
            registry: Mutex::new(Registry::new()),
            countdown: AtomicI64::new(config.initial_trigger),
            collect_pending: AtomicBool::new(false),
            collecting: AtomicUsize::new(0),
            state: AtomicU8::new(GcState::Idle as u8),
            cycles: AtomicU64::new(0),
            logger: GcLogger::new(config.log_json),
            stats: GcStats::new(),
            config,
            weak_self: weak.clone(),
        });

        Ok(Heap { shared })
    }

    /// Create a heap with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(GcConfig::default()).expect("default configuration is valid")
    }

    /// Allocate and initialize one tracked object.
    ///
    /// The initializer runs with the payload's construction context; create
    /// edge fields through it. It may allocate further tracked objects, and
    /// those allocations may trigger collections; the object being built is
    /// kept alive throughout.
    ///
    /// A panicking initializer is rolled back completely and the panic
    /// propagated.
    pub fn alloc<T, F>(&self, init: F) -> Gc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&Ctor<'_>) -> T,
    {
        self.shared.alloc_value(init)
    }

    /// Allocate `count` default-constructed elements.
    ///
    /// Elements are built in index order and torn down in reverse. A
    /// panicking element constructor destroys the already-built prefix in
    /// reverse and rolls the allocation back. Zero-sized element types are
    /// not supported.
    pub fn alloc_array<T>(&self, count: usize) -> Gc<T>
    where
        T: Default + Send + Sync + 'static,
    {
        self.shared.alloc_array(count)
    }

    /// A null root handle bound to this heap.
    pub fn null<T>(&self) -> Gc<T> {
        Gc::from_root_parts(
            Arc::clone(&self.shared),
            None,
            std::ptr::null_mut(),
            false,
        )
    }

    /// Run a full collection now and return its summary.
    pub fn collect(&self) -> CycleStats {
        self.shared.collect_with_reason(GcReason::Explicit)
    }

    /// Final drain: run a full collection and report what stayed rooted.
    ///
    /// Idempotent, and the heap remains usable afterwards; this is the
    /// explicit replacement for an exit-hook collection.
    pub fn shutdown(&self) -> CycleStats {
        let stats = self.shared.collect_with_reason(GcReason::Shutdown);
        let still_rooted = self.live_objects();
        self.shared
            .logger
            .emit(&GcEvent::ShutdownReport { still_rooted });
        stats
    }

    /// Number of currently registered objects.
    pub fn live_objects(&self) -> usize {
        self.shared.registry.lock().live_count()
    }

    /// Current collector state.
    pub fn state(&self) -> GcState {
        GcState::from_u8(self.shared.state.load(Ordering::Relaxed))
    }

    /// Collection cycles started so far.
    pub fn cycle_count(&self) -> u64 {
        self.shared.cycles.load(Ordering::Relaxed)
    }

    /// Snapshot of the heap-wide counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// The configuration this heap was built with.
    pub fn config(&self) -> &GcConfig {
        &self.shared.config
    }

    /// Detailed diagnostic information, insertion-ordered.
    pub fn diagnostics(&self) -> IndexMap<String, String> {
        let mut diagnostics = IndexMap::new();

        diagnostics.insert("state".to_string(), self.state().as_str().to_string());
        diagnostics.insert("cycle_count".to_string(), self.cycle_count().to_string());
        {
            let registry = self.shared.registry.lock();
            diagnostics.insert("live_objects".to_string(), registry.live_count().to_string());
            diagnostics.insert(
                "edge_slots_in_use".to_string(),
                registry.edge_slots_in_use().to_string(),
            );
        }
        diagnostics.insert(
            "countdown".to_string(),
            self.shared.countdown.load(Ordering::Relaxed).to_string(),
        );
        diagnostics.insert(
            "collect_pending".to_string(),
            self.shared
                .collect_pending
                .load(Ordering::Relaxed)
                .to_string(),
        );

        let stats = self.stats();
        diagnostics.insert("allocations".to_string(), stats.allocations.to_string());
        diagnostics.insert(
            "freed_objects".to_string(),
            stats.freed_objects.to_string(),
        );

        diagnostics
    }
}

impl Clone for Heap {
    fn clone(&self) -> Self {
        Heap {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("state", &self.state())
            .field("live_objects", &self.live_objects())
            .field("cycle_count", &self.cycle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_invalid_config_rejected() {
        let config = GcConfig {
            trigger_floor: 0,
            ..Default::default()
        };
        assert!(matches!(
            Heap::new(config),
            Err(CgcError::Configuration(_))
        ));
    }

    #[test]
    fn test_diagnostics_keys() {
        let heap = Heap::with_defaults();
        let _n = heap.alloc(|_| 1u8);
        let diagnostics = heap.diagnostics();

        assert_eq!(diagnostics["state"], "idle");
        assert_eq!(diagnostics["live_objects"], "1");
        assert_eq!(diagnostics["allocations"], "1");
    }

    #[test]
    fn test_shutdown_reports_and_is_idempotent() {
        let heap = Heap::with_defaults();
        let keep = heap.alloc(|_| 3u64);
        heap.alloc(|_| 4u64);

        let first = heap.shutdown();
        assert_eq!(first.freed, 1);
        assert_eq!(heap.live_objects(), 1);

        let second = heap.shutdown();
        assert_eq!(second.freed, 0);
        assert_eq!(*keep, 3);
    }

    #[test]
    fn test_drop_drains_edge_only_garbage() {
        struct Probe(Arc<AtomicUsize>);
        impl Drop for Probe {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let heap = Heap::with_defaults();
            let p = drops.clone();
            let a = heap.alloc(move |_| Probe(p));
            let _holder = heap.alloc(|c| c.edge(&a));
            // Roots drop here; the objects survive until the context drains.
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_heap_usable_from_clone() {
        let heap = Heap::with_defaults();
        let clone = heap.clone();
        let n = clone.alloc(|_| 5i32);
        assert_eq!(heap.live_objects(), 1);
        assert_eq!(*n, 5);
    }
}
