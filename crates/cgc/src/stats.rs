//! Stats Module - GC Performance Monitoring
//!
//! Collects collector statistics for performance tuning, production
//! monitoring and debugging:
//! - Allocation counts and volume
//! - Collection counts and per-cycle summaries
//! - Reclamation counts and volume

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// GcStats - statistics collector
///
/// Central repository for heap-wide counters. All counters are atomic and
/// updated lock-free from the allocation and collection paths.
#[derive(Debug, Default)]
pub struct GcStats {
    /// Total objects allocated
    allocations: AtomicU64,
    /// Total bytes allocated (header + payload blocks)
    allocated_bytes: AtomicU64,
    /// Total collection cycles
    collections: AtomicU64,
    /// Total objects reclaimed
    freed_objects: AtomicU64,
    /// Total bytes reclaimed
    freed_bytes: AtomicU64,
}

impl GcStats {
    /// Create new stats collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one allocation of `bytes` (block size, header included)
    #[inline]
    pub fn record_allocation(&self, bytes: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.allocated_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a completed collection cycle
    pub fn record_collection(&self, cycle: &CycleStats) {
        self.collections.fetch_add(1, Ordering::Relaxed);
        self.freed_objects.fetch_add(cycle.freed as u64, Ordering::Relaxed);
        self.freed_bytes.fetch_add(cycle.bytes_freed as u64, Ordering::Relaxed);
    }

    /// Get total collection cycles
    pub fn collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    /// Take a consistent-enough snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            allocated_bytes: self.allocated_bytes.load(Ordering::Relaxed),
            collections: self.collections.load(Ordering::Relaxed),
            freed_objects: self.freed_objects.load(Ordering::Relaxed),
            freed_bytes: self.freed_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of [`GcStats`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    /// Total objects allocated
    pub allocations: u64,
    /// Total bytes allocated
    pub allocated_bytes: u64,
    /// Total collection cycles
    pub collections: u64,
    /// Total objects reclaimed
    pub freed_objects: u64,
    /// Total bytes reclaimed
    pub freed_bytes: u64,
}

/// Summary of a single collection cycle
///
/// Returned by the explicit collection entry points, so callers (and tests)
/// can observe exactly what a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStats {
    /// Objects in the live set when the cycle started
    pub examined: usize,
    /// Objects marked reachable (seeded roots plus traversal)
    pub marked: usize,
    /// Objects reclaimed by this cycle
    pub freed: usize,
    /// Bytes reclaimed by this cycle (header + payload blocks)
    pub bytes_freed: usize,
    /// Wall-clock duration of the whole cycle in nanoseconds
    pub duration_ns: u64,
}

impl CycleStats {
    /// Cycle duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.duration_ns as f64 / 1_000_000.0
    }

    /// Fraction of examined objects that were reclaimed (0.0 - 1.0)
    pub fn freed_fraction(&self) -> f64 {
        if self.examined == 0 {
            0.0
        } else {
            self.freed as f64 / self.examined as f64
        }
    }
}

/// Simple wall-clock timer for collection cycles
pub struct GcTimer {
    start: Instant,
}

impl GcTimer {
    /// Start a new timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time since creation
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed nanoseconds since creation, saturating
    pub fn elapsed_ns(&self) -> u64 {
        u64::try_from(self.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

impl Default for GcTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_allocation() {
        let stats = GcStats::new();
        stats.record_allocation(64);
        stats.record_allocation(128);

        let snap = stats.snapshot();
        assert_eq!(snap.allocations, 2);
        assert_eq!(snap.allocated_bytes, 192);
    }

    #[test]
    fn test_record_collection() {
        let stats = GcStats::new();
        let cycle = CycleStats {
            examined: 10,
            marked: 7,
            freed: 3,
            bytes_freed: 300,
            duration_ns: 1_500_000,
        };
        stats.record_collection(&cycle);

        let snap = stats.snapshot();
        assert_eq!(snap.collections, 1);
        assert_eq!(snap.freed_objects, 3);
        assert_eq!(snap.freed_bytes, 300);
    }

    #[test]
    fn test_cycle_helpers() {
        let cycle = CycleStats {
            examined: 4,
            marked: 3,
            freed: 1,
            bytes_freed: 100,
            duration_ns: 2_000_000,
        };
        assert!((cycle.duration_ms() - 2.0).abs() < f64::EPSILON);
        assert!((cycle.freed_fraction() - 0.25).abs() < f64::EPSILON);

        let empty = CycleStats::default();
        assert_eq!(empty.freed_fraction(), 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = StatsSnapshot::default();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("allocations"));
    }
}
