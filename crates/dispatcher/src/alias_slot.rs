//! Publication point for the dispatcher's current alias table and the
//! periodic loop that rebuilds it from the node signal registry. Grounded
//! in `src/central/alias.go` (`CtlAliasTable`, the max-samples countdown)
//! and `src/central/server.go`'s signal slots as the rebuild's input.
//!
//! `alias::CtlAliasTable::sample` needs `&mut self` to decrement its
//! countdown, so unlike the FPCA `p`-vector or the aggregator's `U`
//! (immutable values swapped behind an `Arc`), the published table sits
//! behind a short-held `parking_lot::Mutex` — the same "no RPC under lock"
//! discipline the event cache and capacity filter already use. Readers
//! blocked on an exhausted or absent table wait on a `Notify`, standing in
//! for the source's condition variable.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Notify;
use tracing::{debug, warn};

use alias::CtlAliasTable;
use shared::constants::ALIAS_WEIGHT_EPSILON;

use crate::registry::NodeRegistry;

/// Holds the currently usable alias table, if any, and wakes waiters each
/// time a fresh one is published.
pub struct AliasSlot {
    current: Mutex<Option<CtlAliasTable>>,
    ready: Notify,
}

impl AliasSlot {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            ready: Notify::new(),
        }
    }

    /// Replace the published table and wake every blocked sampler.
    pub fn publish(&self, table: CtlAliasTable) {
        *self.current.lock() = Some(table);
        self.ready.notify_waiters();
    }

    /// Attempt one draw without blocking. `None` if no table is published
    /// or the published one is exhausted — the caller (the watch loop) is
    /// expected to route the pod to the retry queue in that case.
    pub fn try_sample(&self) -> Option<usize> {
        let mut rng = StdRng::from_entropy();
        let mut guard = self.current.lock();
        let table = guard.as_mut()?;
        if !table.samples_left() {
            return None;
        }
        table.sample(&mut rng).ok()
    }

    /// Draw a node index, waiting on the readiness notification whenever
    /// the table is absent or exhausted rather than busy-polling.
    pub async fn sample(&self) -> usize {
        loop {
            if let Some(idx) = self.try_sample() {
                return idx;
            }
            self.ready.notified().await;
        }
    }
}

impl Default for AliasSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the alias updater loop until `registry` is dropped: every `period`,
/// snapshot the node signals, drop nodes at or below
/// [`ALIAS_WEIGHT_EPSILON`], and rebuild+publish the alias table over the
/// survivors, capped at `max_samples` draws before the next forced rebuild.
pub async fn run_alias_updater(
    registry: Arc<NodeRegistry>,
    slot: Arc<AliasSlot>,
    period: Duration,
    max_samples: u32,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;

        let (idxs, weights): (Vec<usize>, Vec<f64>) = registry
            .snapshot()
            .into_iter()
            .filter(|&(_, signal)| signal > ALIAS_WEIGHT_EPSILON)
            .unzip();

        if weights.is_empty() {
            debug!("no node clears the alias weight epsilon this round, keeping prior table");
            continue;
        }

        let built = CtlAliasTable::new(&weights)
            .and_then(|t| t.with_idxs(idxs))
            .and_then(|t| t.with_max_samples(max_samples));

        match built {
            Ok(table) => slot.publish(table),
            Err(err) => warn!(error = %err, "alias table rebuild rejected this round's weights"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_blocks_until_a_table_is_published() {
        let slot = Arc::new(AliasSlot::new());
        assert_eq!(slot.try_sample(), None);

        let slot2 = slot.clone();
        let handle = tokio::spawn(async move { slot2.sample().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        slot.publish(CtlAliasTable::new(&[1.0, 1.0]).unwrap());

        let idx = tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("sample completed after publish")
            .unwrap();
        assert!(idx == 0 || idx == 1);
    }

    #[tokio::test]
    async fn updater_skips_a_round_with_no_surviving_weight() {
        let registry = Arc::new(NodeRegistry::new(vec!["a".into(), "b".into()]));
        registry.set(0, 0.0);
        registry.set(1, 0.0);
        let slot = Arc::new(AliasSlot::new());

        let updater = tokio::spawn(run_alias_updater(
            registry.clone(),
            slot.clone(),
            Duration::from_millis(5),
            4,
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        updater.abort();

        assert_eq!(slot.try_sample(), None);
    }

    #[tokio::test]
    async fn updater_publishes_a_table_over_surviving_nodes() {
        let registry = Arc::new(NodeRegistry::new(vec!["a".into(), "b".into()]));
        registry.set(0, 5.0);
        registry.set(1, 0.0);
        let slot = Arc::new(AliasSlot::new());

        let updater = tokio::spawn(run_alias_updater(
            registry.clone(),
            slot.clone(),
            Duration::from_millis(5),
            4,
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        updater.abort();

        assert_eq!(slot.try_sample(), Some(0));
    }
}
