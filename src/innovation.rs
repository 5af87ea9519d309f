//! Node id and lineage number allocation.
//!
//! Lineage numbers align genes across genomes during crossover: two genomes
//! holding the same lineage number hold the same historical structural change.
//! That only works if every genome draws from the same pair of sequences, so
//! [`Sequences`] is an explicit object shared by reference (typically behind an
//! `Arc`) rather than a hidden static. Tests create their own and get
//! deterministic, isolated numbering.

use std::sync::atomic::{AtomicU64, Ordering};

/// Two independent monotonic counters: node ids and connection lineage numbers.
///
/// Allocation is a single atomic `fetch_add`, so one instance can be shared by
/// concurrent mutation without locking.
#[derive(Debug, Default)]
pub struct Sequences {
    next_node: AtomicU64,
    next_lineage: AtomicU64,
}

impl Sequences {
    /// Fresh sequences starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequences whose next allocations are `node` and `lineage`.
    #[must_use]
    pub fn starting_at(node: u64, lineage: u64) -> Self {
        Self {
            next_node: AtomicU64::new(node),
            next_lineage: AtomicU64::new(lineage),
        }
    }

    /// Allocate the next node id.
    #[inline]
    pub fn next_node_id(&self) -> u64 {
        self.next_node.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate the next connection lineage number.
    #[inline]
    pub fn next_lineage(&self) -> u64 {
        self.next_lineage.fetch_add(1, Ordering::Relaxed)
    }

    /// Make sure future allocations come after `node_id` and `lineage`.
    ///
    /// Called after loading persisted genomes so new structure never reuses a
    /// number already present on disk.
    pub fn observe(&self, node_id: Option<u64>, lineage: Option<u64>) {
        if let Some(id) = node_id {
            self.next_node
                .fetch_max(id.saturating_add(1), Ordering::Relaxed);
        }
        if let Some(l) = lineage {
            self.next_lineage
                .fetch_max(l.saturating_add(1), Ordering::Relaxed);
        }
    }

    /// Next node id that would be handed out, without allocating it.
    #[must_use]
    pub fn peek_node_id(&self) -> u64 {
        self.next_node.load(Ordering::Relaxed)
    }

    /// Next lineage number that would be handed out, without allocating it.
    #[must_use]
    pub fn peek_lineage(&self) -> u64 {
        self.next_lineage.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sequences_are_independent() {
        let seq = Sequences::new();
        assert_eq!(seq.next_node_id(), 0);
        assert_eq!(seq.next_node_id(), 1);
        assert_eq!(seq.next_lineage(), 0);
        assert_eq!(seq.next_node_id(), 2);
        assert_eq!(seq.next_lineage(), 1);
    }

    #[test]
    fn test_starting_at() {
        let seq = Sequences::starting_at(13, 100);
        assert_eq!(seq.next_node_id(), 13);
        assert_eq!(seq.next_lineage(), 100);
    }

    #[test]
    fn test_observe_only_moves_forward() {
        let seq = Sequences::starting_at(10, 10);
        seq.observe(Some(4), Some(20));
        assert_eq!(seq.peek_node_id(), 10);
        assert_eq!(seq.peek_lineage(), 21);
        seq.observe(None, None);
        assert_eq!(seq.peek_lineage(), 21);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let seq = Arc::new(Sequences::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let seq = Arc::clone(&seq);
                std::thread::spawn(move || (0..250).map(|_| seq.next_lineage()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000, "every lineage number must be unique");
        assert_eq!(seq.peek_lineage(), 1000);
    }
}
