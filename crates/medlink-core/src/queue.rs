// ── Offline request queue ──
//
// Bounded FIFO buffer of translation requests made while disconnected.
// Items are never reordered, merged, or mutated in place; the sync
// reconciler removes exactly the items that replayed successfully.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::model::OfflineQueueItem;

/// Hard cap on queued offline requests.
pub const MAX_QUEUE_SIZE: usize = 500;

/// Insertion-ordered queue of offline translation requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfflineQueue {
    items: VecDeque<OfflineQueueItem>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. At capacity, the single oldest item is evicted
    /// first and returned.
    pub fn enqueue(&mut self, item: OfflineQueueItem) -> Option<OfflineQueueItem> {
        let evicted = if self.items.len() >= MAX_QUEUE_SIZE {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// All items in insertion order, without removing them.
    pub fn drain(&self) -> Vec<OfflineQueueItem> {
        self.items.iter().cloned().collect()
    }

    /// Remove exactly the given items (first match each), leaving the
    /// rest in their original order. Returns how many were removed.
    pub fn remove(&mut self, items: &[OfflineQueueItem]) -> usize {
        let mut removed = 0;
        for item in items {
            if let Some(pos) = self.items.iter().position(|q| q == item) {
                self.items.remove(pos);
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn oldest(&self) -> Option<&OfflineQueueItem> {
        self.items.front()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::TranslationJob;
    use chrono::{Duration, Utc};

    fn item(n: usize) -> OfflineQueueItem {
        OfflineQueueItem {
            job: TranslationJob::text(format!("msg {n}"), "en", "es", None),
            // Spread timestamps so "oldest" is well-defined.
            enqueued_at: Utc::now() + Duration::milliseconds(i64::try_from(n).unwrap()),
        }
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = OfflineQueue::new();
        let items: Vec<_> = (0..5).map(item).collect();
        for it in &items {
            q.enqueue(it.clone());
        }
        assert_eq!(q.drain(), items);
        // drain() is non-destructive
        assert_eq!(q.len(), 5);
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_single_oldest() {
        let mut q = OfflineQueue::new();
        let first = item(0);
        q.enqueue(first.clone());
        for n in 1..MAX_QUEUE_SIZE {
            q.enqueue(item(n));
        }
        assert_eq!(q.len(), MAX_QUEUE_SIZE);

        // The 501st enqueue evicts exactly the oldest.
        let evicted = q.enqueue(item(MAX_QUEUE_SIZE));
        assert_eq!(q.len(), MAX_QUEUE_SIZE);
        assert_eq!(evicted.as_ref(), Some(&first));
        assert!(!q.drain().contains(&first));
    }

    #[test]
    fn remove_keeps_residual_order() {
        let mut q = OfflineQueue::new();
        let items: Vec<_> = (0..6).map(item).collect();
        for it in &items {
            q.enqueue(it.clone());
        }

        let removed = q.remove(&[items[1].clone(), items[3].clone(), items[4].clone()]);
        assert_eq!(removed, 3);

        let rest = q.drain();
        assert_eq!(rest, vec![items[0].clone(), items[2].clone(), items[5].clone()]);
    }

    #[test]
    fn remove_of_absent_item_is_a_noop() {
        let mut q = OfflineQueue::new();
        q.enqueue(item(0));
        assert_eq!(q.remove(&[item(99)]), 0);
        assert_eq!(q.len(), 1);
    }
}
