//! Test Utilities for the CGC Bug-Finding Test Suite
//!
//! Shared fixture, instrumented payload types and strict assertion helpers.
//! Assertions are exact: a duplicate or missing destruction is a collector
//! bug, never tolerance-worthy noise.

#![allow(dead_code)]

use cgc::{Gc, GcConfig, Heap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Test fixture wrapping a heap plus the configuration it was built with.
pub struct HeapFixture {
    pub heap: Heap,
    pub config: GcConfig,
}

impl HeapFixture {
    /// Fixture with default configuration and a trigger high enough that
    /// collections only happen when a test asks for them.
    pub fn with_defaults() -> Self {
        Self::with_trigger(1_000_000)
    }

    /// Fixture with an explicit allocation trigger.
    pub fn with_trigger(trigger: i64) -> Self {
        let config = GcConfig {
            initial_trigger: trigger,
            trigger_floor: trigger,
            ..Default::default()
        };
        let heap = Heap::new(config.clone()).expect("test configuration is valid");
        Self { heap, config }
    }
}

/// Drop counter payload component.
///
/// **Bug this finds:** missing or duplicate finalization.
pub struct DropTally {
    counter: Arc<AtomicUsize>,
}

impl DropTally {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        Self { counter }
    }
}

impl Drop for DropTally {
    fn drop(&mut self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Graph node with one outgoing heap edge.
pub struct Node {
    pub next: Gc<Node>,
    pub tally: DropTally,
}

/// Allocate a node with a null edge and a drop tally.
pub fn alloc_node(heap: &Heap, drops: &Arc<AtomicUsize>) -> Gc<Node> {
    let tally = DropTally::new(drops.clone());
    heap.alloc(move |c| Node {
        next: c.null_edge(),
        tally,
    })
}

/// Allocate `count` nodes chained head -> tail through heap edges.
pub fn alloc_chain(heap: &Heap, drops: &Arc<AtomicUsize>, count: usize) -> Vec<Gc<Node>> {
    let nodes: Vec<_> = (0..count).map(|_| alloc_node(heap, drops)).collect();
    for window in nodes.windows(2) {
        window[0].next.set(&window[1]);
    }
    nodes
}

/// Allocate `count` nodes linked into a ring, returning all roots.
pub fn alloc_ring(heap: &Heap, drops: &Arc<AtomicUsize>, count: usize) -> Vec<Gc<Node>> {
    let nodes = alloc_chain(heap, drops, count);
    if count > 1 {
        nodes[count - 1].next.set(&nodes[0]);
    }
    nodes
}

/// Assert an exact number of destructions.
///
/// **Bug this finds:** lost objects (leak) or double finalization.
#[track_caller]
pub fn assert_drops(drops: &Arc<AtomicUsize>, expected: usize, context: &str) {
    assert_eq!(
        drops.load(Ordering::SeqCst),
        expected,
        "{context}: destruction count mismatch - each object must be finalized exactly once"
    );
}

/// Assert the heap has exactly `expected` registered objects.
///
/// **Bug this finds:** lost or duplicate registration, sweep bugs.
#[track_caller]
pub fn assert_live(heap: &Heap, expected: usize, context: &str) {
    assert_eq!(
        heap.live_objects(),
        expected,
        "{context}: live-object count mismatch"
    );
}
