//! Proxied uploads: payload bytes pass through the gateway.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A file received on `POST /upload`, consumed by a single `Put`.
#[derive(Debug)]
pub struct UploadRequest {
    pub original_name: String,
    pub payload: Bytes,
    pub content_type: String,
}

/// What the gateway reports back once the store accepted an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
    pub public_url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}
