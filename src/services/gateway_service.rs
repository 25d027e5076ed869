//! GatewayService: every operation the HTTP surface exposes, composed from
//! the key generator, the object store client, the metadata enricher and the
//! ticket issuer.
//!
//! The service is cheap to clone and holds no mutable state: the object store
//! is the only source of truth for which blobs exist.

use crate::{
    models::{
        blob::BlobRecord,
        ticket::{AccessTicket, PresignedUploadTicket},
        upload::{UploadReceipt, UploadRequest},
    },
    services::{
        key_generator,
        metadata_enricher::MetadataEnricher,
        object_store_client::{CallGuard, ObjectStoreClient, StoreResult},
        ticket_issuer::TicketIssuer,
    },
};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Tunables fixed at startup.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Base of the public object URL reported for proxied uploads.
    pub public_base_url: String,
    pub download_ttl: Duration,
    pub upload_ttl: Duration,
    pub backend_timeout: Duration,
    pub max_in_flight: usize,
    pub max_upload_bytes: usize,
}

#[derive(Clone)]
pub struct GatewayService {
    store: Arc<dyn ObjectStoreClient>,
    guard: CallGuard,
    enricher: MetadataEnricher,
    tickets: TicketIssuer,
    public_base_url: Arc<str>,
    max_upload_bytes: usize,
}

impl GatewayService {
    pub fn new(store: Arc<dyn ObjectStoreClient>, settings: &GatewaySettings) -> Self {
        let guard = CallGuard::new(settings.backend_timeout);
        Self {
            enricher: MetadataEnricher::new(store.clone(), guard, settings.max_in_flight),
            tickets: TicketIssuer::new(
                store.clone(),
                guard,
                settings.upload_ttl,
                settings.download_ttl,
            ),
            store,
            guard,
            public_base_url: settings.public_base_url.trim_end_matches('/').into(),
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Every blob in the bucket with its metadata, in backend listing order.
    pub async fn list_blobs(&self, cancel: &CancellationToken) -> StoreResult<Vec<BlobRecord>> {
        let keys = self.guard.run("list", cancel, self.store.list()).await?;
        self.enricher.enrich(keys, cancel).await
    }

    /// Store an uploaded file under a freshly generated key.
    pub async fn upload_blob(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> StoreResult<UploadReceipt> {
        let key = key_generator::generate(&request.original_name);
        let size_bytes = request.payload.len() as u64;

        self.guard
            .run(
                "put",
                cancel,
                self.store
                    .put(&key, request.payload, &request.content_type),
            )
            .await?;

        info!(
            key = %key,
            original_name = %request.original_name,
            size_bytes,
            "uploaded blob"
        );
        Ok(UploadReceipt {
            public_url: format!("{}/{}", self.public_base_url, key),
            key,
            content_type: request.content_type,
            size_bytes,
            uploaded_at: Utc::now(),
        })
    }

    pub async fn download_ticket(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> StoreResult<AccessTicket> {
        self.tickets.issue_download(key, cancel).await
    }

    pub async fn upload_ticket(
        &self,
        original_name: &str,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> StoreResult<PresignedUploadTicket> {
        self.tickets
            .issue_upload(original_name, content_type, cancel)
            .await
    }

    pub async fn delete_blob(&self, key: &str, cancel: &CancellationToken) -> StoreResult<()> {
        self.guard
            .run("delete", cancel, self.store.delete(key))
            .await?;
        info!(key, "deleted blob");
        Ok(())
    }

    /// Readiness: the bucket answers within the backend timeout.
    pub async fn check_store(&self, cancel: &CancellationToken) -> StoreResult<()> {
        self.guard.run("ping", cancel, self.store.ping()).await
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }
}
