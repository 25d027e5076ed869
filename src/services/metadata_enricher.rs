//! Turns a raw key listing into display-ready [`BlobRecord`]s.

use crate::{
    models::blob::BlobRecord,
    services::object_store_client::{CallGuard, ObjectStoreClient, StoreError, StoreResult},
};
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fetches metadata for many keys at once with a bounded number of `head`
/// calls in flight.
#[derive(Clone)]
pub struct MetadataEnricher {
    store: Arc<dyn ObjectStoreClient>,
    guard: CallGuard,
    max_in_flight: usize,
}

impl MetadataEnricher {
    pub fn new(store: Arc<dyn ObjectStoreClient>, guard: CallGuard, max_in_flight: usize) -> Self {
        Self {
            store,
            guard,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Build one record per key, in the order of `keys`.
    ///
    /// A failed or timed-out `head` degrades only its own record (see
    /// [`BlobRecord::unenriched`]). Cancellation aborts the whole listing.
    pub async fn enrich(
        &self,
        keys: Vec<String>,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<BlobRecord>> {
        let total = keys.len();

        // `buffered` polls up to `max_in_flight` futures concurrently but
        // yields their outputs in input order.
        let records: Vec<BlobRecord> = stream::iter(keys)
            .map(|key| self.enrich_one(key, cancel))
            .buffered(self.max_in_flight)
            .try_collect()
            .await?;

        let degraded = records
            .iter()
            .filter(|r| r.size_bytes.is_none())
            .count();
        debug!(total, degraded, "enriched listing");
        Ok(records)
    }

    async fn enrich_one(&self, key: String, cancel: &CancellationToken) -> StoreResult<BlobRecord> {
        match self.guard.run("head", cancel, self.store.head(&key)).await {
            Ok(head) => Ok(BlobRecord::from_head(key, head)),
            Err(err @ StoreError::Cancelled { .. }) => Err(err),
            Err(err) => {
                warn!(key = %key, error = %err, "metadata fetch failed, returning bare record");
                Ok(BlobRecord::unenriched(key))
            }
        }
    }
}
