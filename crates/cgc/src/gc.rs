//! GC Core Module - Mark-and-Sweep Cycle Management
//!
//! Implements the collection cycle:
//!
//! 1. **Seeding** (mutex held): objects with a nonzero root count are marked
//!    and their edge targets pushed onto the work stack; everything else is
//!    unmarked.
//! 2. **Marking** (mutex held): reachability closure over the edge graph
//!    from the seeded objects.
//! 3. **Partitioning** (mutex held): stable split of the live set; the
//!    unmarked tail leaves the live set immediately and the trigger
//!    countdown is recalibrated to `max(2 * live, floor)`.
//! 4. **Finalizing** (mutex released): destructors run over the garbage
//!    batch. Unlocked on purpose: destructors may allocate tracked objects
//!    or request another collection, and both must be able to take the
//!    mutex without deadlocking against this run.
//! 5. **Freeing** (mutex re-acquired): edge slots are recycled and the raw
//!    blocks released.
//!
//! A run executes synchronously on the invoking thread. Lock-free pointer
//! operations on other threads proceed throughout; their locked sub-steps
//! serialize with the locked phases above.

use crate::heap::HeapShared;
use crate::logging::GcEvent;
use crate::object::record::{self, ObjectRecord};
use crate::stats::{CycleStats, GcTimer};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

/// GC cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GcState {
    /// Idle - no collection in progress
    Idle = 0,
    /// Seeding work from root-referenced objects
    Seeding = 1,
    /// Tracing reachability through heap edges
    Marking = 2,
    /// Splitting live set from the garbage batch
    Partitioning = 3,
    /// Running destructors (unlocked)
    Finalizing = 4,
    /// Releasing blocks and edge slots
    Freeing = 5,
}

impl GcState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => GcState::Seeding,
            2 => GcState::Marking,
            3 => GcState::Partitioning,
            4 => GcState::Finalizing,
            5 => GcState::Freeing,
            _ => GcState::Idle,
        }
    }

    /// Short name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            GcState::Idle => "idle",
            GcState::Seeding => "seeding",
            GcState::Marking => "marking",
            GcState::Partitioning => "partitioning",
            GcState::Finalizing => "finalizing",
            GcState::Freeing => "freeing",
        }
    }
}

/// Reason for a collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcReason {
    /// Allocation countdown expired
    Threshold,
    /// A root was explicitly cleared
    RootCleared,
    /// Explicit collect() request
    Explicit,
    /// Shutdown drain
    Shutdown,
}

impl GcReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GcReason::Threshold => "threshold",
            GcReason::RootCleared => "root_cleared",
            GcReason::Explicit => "explicit",
            GcReason::Shutdown => "shutdown",
        }
    }
}

impl HeapShared {
    /// Run one full collection cycle and return its summary.
    pub(crate) fn collect_with_reason(&self, reason: GcReason) -> CycleStats {
        let timer = GcTimer::new();
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.collecting.fetch_add(1, Ordering::AcqRel);

        let mut stats = CycleStats::default();
        let garbage: Vec<NonNull<ObjectRecord>>;

        {
            let mut registry = self.registry.lock();
            stats.examined = registry.live_count();
            self.logger.emit(&GcEvent::CycleStart {
                cycle,
                reason: reason.as_str(),
                live: stats.examined,
            });

            self.set_state(GcState::Seeding);
            let mut pending: Vec<NonNull<ObjectRecord>> =
                Vec::with_capacity(stats.examined / 4 + 1);
            for &rec in registry.live() {
                let r = unsafe { rec.as_ref() };
                if r.root_refs.load(Ordering::Acquire) != 0 {
                    r.set_marked(true);
                    stats.marked += 1;
                    for target in registry.edge_targets(r.addr()) {
                        if let Some(t) = NonNull::new(target as *mut ObjectRecord) {
                            pending.push(t);
                        }
                    }
                } else {
                    r.set_marked(false);
                }
            }

            self.set_state(GcState::Marking);
            while let Some(rec) = pending.pop() {
                let r = unsafe { rec.as_ref() };
                if r.is_marked() {
                    continue;
                }
                r.set_marked(true);
                stats.marked += 1;
                for target in registry.edge_targets(r.addr()) {
                    if let Some(t) = NonNull::new(target as *mut ObjectRecord) {
                        if !unsafe { t.as_ref() }.is_marked() {
                            pending.push(t);
                        }
                    }
                }
            }

            self.set_state(GcState::Partitioning);
            let (live, dead): (Vec<_>, Vec<_>) = registry
                .take_live()
                .into_iter()
                .partition(|rec| unsafe { rec.as_ref() }.is_marked());
            garbage = dead;
            stats.freed = garbage.len();

            let trigger = (live.len() as i64)
                .saturating_mul(2)
                .max(self.config.trigger_floor);
            registry.replace_live(live);
            self.countdown.store(trigger, Ordering::Relaxed);

            // Lock released here, before destructors run.
        }

        self.set_state(GcState::Finalizing);
        for &rec in &garbage {
            let outcome =
                catch_unwind(AssertUnwindSafe(|| unsafe { rec.as_ref().run_destructor() }));
            if outcome.is_err() {
                // Destructors are required never to unwind; this is not a
                // recoverable state.
                log::error!("gc cycle {cycle}: destructor panicked during finalization, aborting");
                std::process::abort();
            }
        }

        self.set_state(GcState::Freeing);
        {
            let mut registry = self.registry.lock();
            for &rec in &garbage {
                unsafe {
                    stats.bytes_freed += rec.as_ref().block_size();
                    registry.release_edges(rec.as_ref().addr());
                    record::free_block(rec);
                }
            }
        }

        self.set_state(GcState::Idle);
        self.collecting.fetch_sub(1, Ordering::AcqRel);

        stats.duration_ns = timer.elapsed_ns();
        if self.config.stats_enabled {
            self.stats.record_collection(&stats);
        }
        self.logger.emit(&GcEvent::CycleEnd {
            cycle,
            stats: stats.clone(),
        });
        stats
    }

    #[inline]
    fn set_state(&self, state: GcState) {
        self.state.store(state as u8, Ordering::Relaxed);
        log::trace!("gc state -> {}", state.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GcConfig, Heap};

    #[test]
    fn test_state_roundtrip() {
        for state in [
            GcState::Idle,
            GcState::Seeding,
            GcState::Marking,
            GcState::Partitioning,
            GcState::Finalizing,
            GcState::Freeing,
        ] {
            assert_eq!(GcState::from_u8(state as u8), state);
        }
        assert_eq!(GcState::from_u8(200), GcState::Idle);
    }

    #[test]
    fn test_collect_on_empty_heap() {
        let heap = Heap::with_defaults();
        let stats = heap.collect();
        assert_eq!(stats.examined, 0);
        assert_eq!(stats.freed, 0);
        assert_eq!(heap.state(), GcState::Idle);
    }

    #[test]
    fn test_trigger_recalibration_scales_with_live_set() {
        let floor = 8;
        let heap = Heap::new(GcConfig {
            initial_trigger: 1_000_000,
            trigger_floor: floor,
            ..Default::default()
        })
        .unwrap();

        // 100 rooted objects: the next trigger must be 2 * live.
        let roots: Vec<_> = (0..100).map(|i| heap.alloc(move |_| i)).collect();
        heap.collect();
        assert_eq!(heap.diagnostics()["countdown"], "200");

        // Empty heap: the floor wins.
        drop(roots);
        heap.collect();
        assert_eq!(heap.diagnostics()["countdown"], floor.to_string());
    }

    #[test]
    fn test_marked_counts_roots_and_traversal() {
        let heap = Heap::with_defaults();
        let inner = heap.alloc(|_| 1u32);
        let outer = heap.alloc(|c| c.edge(&inner));
        drop(inner);

        let stats = heap.collect();
        assert_eq!(stats.examined, 2);
        // outer is seeded from its root, inner reached by traversal.
        assert_eq!(stats.marked, 2);
        assert_eq!(stats.freed, 0);
        drop(outer);
    }
}
