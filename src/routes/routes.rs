//! Defines routes for the blob gateway.
//!
//! ## Structure
//! - **Collection endpoints**
//!   - `GET    /`                  - list blobs with metadata
//!   - `POST   /upload`            - proxied multipart upload (field `file`)
//!   - `POST   /presigned-upload`  - issue a direct-to-store upload URL
//!
//! - **Blob endpoints**
//!   - `GET    /{key}` - issue a time-limited download URL
//!   - `DELETE /{key}` - delete a blob
//!
//! - **Probes**
//!   - `GET    /healthz`, `GET /readyz`
//!
//! Static segments win over `{key}`; generated keys never collide with them.

use crate::{
    handlers::{
        blob_handlers::{delete_blob, download_ticket, list_blobs, presigned_upload, upload_blob},
        health_handlers::{healthz, readyz},
    },
    services::gateway_service::GatewayService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build and return the router for every gateway endpoint.
///
/// The upload route gets a body limit slightly above `max_upload_bytes`;
/// the exact per-file limit is enforced by the upload handler.
pub fn routes(max_upload_bytes: usize) -> Router<GatewayService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", get(list_blobs))
        .route(
            "/upload",
            post(upload_blob).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
            )),
        )
        .route("/presigned-upload", post(presigned_upload))
        .route("/{key}", get(download_ticket).delete(delete_blob))
}
