//! Presigned upload and download tickets.
//!
//! Tickets move no payload bytes through the gateway: clients talk to the
//! object store directly with the signed URL until it expires.

use crate::{
    models::ticket::{AccessTicket, PresignedUploadTicket},
    services::{
        key_generator,
        object_store_client::{CallGuard, ObjectStoreClient, StoreResult, UrlOperation},
    },
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub struct TicketIssuer {
    store: Arc<dyn ObjectStoreClient>,
    guard: CallGuard,
    upload_ttl: Duration,
    download_ttl: Duration,
}

impl TicketIssuer {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        guard: CallGuard,
        upload_ttl: Duration,
        download_ttl: Duration,
    ) -> Self {
        Self {
            store,
            guard,
            upload_ttl,
            download_ttl,
        }
    }

    /// Mint a new key for `original_name` and a `PUT` URL for it.
    ///
    /// The gateway gets no confirmation that the client upload happened; the
    /// object shows up in listings once the store has it.
    pub async fn issue_upload(
        &self,
        original_name: &str,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> StoreResult<PresignedUploadTicket> {
        let key = key_generator::generate(original_name);
        let signed = self
            .guard
            .run(
                "signed_url",
                cancel,
                self.store
                    .signed_url(&key, UrlOperation::Write, self.upload_ttl),
            )
            .await?;

        info!(
            key = %key,
            original_name,
            content_type,
            expires_at = %signed.expires_at,
            "issued upload ticket"
        );
        Ok(PresignedUploadTicket {
            generated_key: key,
            upload_url: signed.url,
            content_type: content_type.to_string(),
            expires_at: signed.expires_at,
        })
    }

    /// A fresh `GET` URL for `key`. Never cached: an earlier URL may already
    /// have expired.
    pub async fn issue_download(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> StoreResult<AccessTicket> {
        let signed = self
            .guard
            .run(
                "signed_url",
                cancel,
                self.store
                    .signed_url(key, UrlOperation::Read, self.download_ttl),
            )
            .await?;

        Ok(AccessTicket {
            url: signed.url,
            expires_at: signed.expires_at,
        })
    }
}
