//! Fixed node-name-to-index mapping plus the per-node atomic signal array.
//! Grounded in `src/central/server.go`'s `StreamSignals` (`nodeSignals[index]
//! .Store(math.Float64bits(...))`): the slot array is sized once at init and
//! every writer is single-threaded per slot by construction, so readers take
//! no lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use shared::types::NodeId;

/// Owns the node-name -> index mapping fixed at dispatcher startup and one
/// atomic 64-bit word per node, holding the latest signal as IEEE-754 bits.
pub struct NodeRegistry {
    names: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    signals: Vec<AtomicU64>,
}

impl NodeRegistry {
    /// Builds a registry over a fixed set of node names; indices are
    /// assigned in the order given and never change afterward.
    pub fn new(names: Vec<NodeId>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let signals = names.iter().map(|_| AtomicU64::new(0)).collect();
        Self { names, index, signals }
    }

    /// Number of nodes tracked.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of `name`, if it was part of the fixed set at construction.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Node name at `index`.
    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    /// Publish the latest signal for node `index`.
    pub fn set(&self, index: usize, signal: f64) {
        self.signals[index].store(signal.to_bits(), Ordering::Release);
    }

    /// Reset node `index`'s signal to zero, e.g. on stream disconnect, so a
    /// dead node stops winning alias-table draws.
    pub fn zero(&self, index: usize) {
        self.set(index, 0.0);
    }

    /// Current signal for node `index`.
    pub fn get(&self, index: usize) -> f64 {
        f64::from_bits(self.signals[index].load(Ordering::Acquire))
    }

    /// A point-in-time `(index, signal)` snapshot over every tracked node.
    /// Each slot is read independently and without a lock, so this is not a
    /// single atomic instant across the whole set — consistent with the
    /// alias updater's "staleness is acceptable" design note.
    pub fn snapshot(&self) -> Vec<(usize, f64)> {
        (0..self.names.len()).map(|i| (i, self.get(i))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip_through_the_bit_pattern() {
        let reg = NodeRegistry::new(vec!["a".into(), "b".into()]);
        reg.set(0, 1.25);
        reg.set(1, 0.0);
        assert_eq!(reg.get(0), 1.25);
        assert_eq!(reg.get(1), 0.0);
    }

    #[test]
    fn index_of_resolves_names_fixed_at_construction() {
        let reg = NodeRegistry::new(vec!["node-a".into(), "node-b".into()]);
        assert_eq!(reg.index_of("node-b"), Some(1));
        assert_eq!(reg.index_of("unknown"), None);
    }

    #[test]
    fn zero_resets_a_disconnected_node() {
        let reg = NodeRegistry::new(vec!["a".into()]);
        reg.set(0, 3.0);
        reg.zero(0);
        assert_eq!(reg.get(0), 0.0);
    }

    #[test]
    fn snapshot_covers_every_node_in_index_order() {
        let reg = NodeRegistry::new(vec!["a".into(), "b".into(), "c".into()]);
        reg.set(0, 1.0);
        reg.set(1, 2.0);
        reg.set(2, 3.0);
        assert_eq!(reg.snapshot(), vec![(0, 1.0), (1, 2.0), (2, 3.0)]);
    }
}
