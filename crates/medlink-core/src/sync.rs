// ── Sync reconciliation ──
//
// Replays queued offline requests against the cloud once connectivity
// returns. Each item stands alone: one failure never aborts the batch,
// and only confirmed successes leave the durable queue. Repeated calls
// converge on a stable remainder.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityHandle;
use crate::error::CoreError;
use crate::selector::EndpointSelector;
use crate::store::StateStore;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub last_sync: DateTime<Utc>,
}

/// Replays the offline queue against the cloud endpoint.
pub struct SyncReconciler {
    store: Arc<StateStore>,
    selector: Arc<EndpointSelector>,
    connectivity: ConnectivityHandle,
}

impl SyncReconciler {
    pub fn new(
        store: Arc<StateStore>,
        selector: Arc<EndpointSelector>,
        connectivity: ConnectivityHandle,
    ) -> Self {
        Self {
            store,
            selector,
            connectivity,
        }
    }

    /// Run one pass over the current queue snapshot.
    pub async fn sync(&self) -> Result<SyncOutcome, CoreError> {
        if !self.connectivity.is_connected() {
            return Err(CoreError::NoNetwork);
        }

        let items = self.store.queue_items().await;
        let now = Utc::now();

        if items.is_empty() {
            self.store.set_last_sync(now).await;
            return Ok(SyncOutcome {
                attempted: 0,
                synced: 0,
                failed: 0,
                last_sync: now,
            });
        }

        info!(queued = items.len(), "replaying offline queue");

        let mut synced = Vec::new();
        for item in &items {
            match self.selector.replay_to_cloud(&item.job).await {
                Ok(result) => {
                    // A replayed translation is a completed translation.
                    self.store.cache_put(&item.job.cache_key(), result).await;
                    synced.push(item.clone());
                }
                Err(e) => {
                    debug!(error = %e, enqueued_at = %item.enqueued_at, "item failed -- staying queued");
                }
            }
        }

        let removed = self.store.remove_queue_items(&synced).await;
        // last_sync moves forward even on partial failure.
        self.store.set_last_sync(now).await;

        let failed = items.len() - synced.len();
        if failed > 0 {
            warn!(synced = removed, failed, "sync completed with failures");
        } else {
            info!(synced = removed, "sync complete");
        }

        Ok(SyncOutcome {
            attempted: items.len(),
            synced: removed,
            failed,
            last_sync: now,
        })
    }
}
