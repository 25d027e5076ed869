//! The capability set the gateway needs from an object store, and the error
//! taxonomy every backend failure is classified into.

use crate::models::blob::ObjectHead;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{key}` not found")]
    NotFound { key: String },
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    #[error("{op} cancelled by caller")]
    Cancelled { op: &'static str },
    #[error("{op} failed for `{key}`: {source}")]
    Backend {
        op: &'static str,
        key: String,
        #[source]
        source: object_store::Error,
    },
}

/// Coarse classification the HTTP layer maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Store,
}

impl StoreError {
    /// Classify an `object_store` failure for `key`.
    pub fn from_backend(op: &'static str, key: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                key: key.to_string(),
            },
            object_store::Error::InvalidPath { .. } => StoreError::InvalidKey(key.to_string()),
            source => StoreError::Backend {
                op,
                key: key.to_string(),
                source,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidKey(_) => ErrorKind::Validation,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Timeout { .. }
            | StoreError::Cancelled { .. }
            | StoreError::Backend { .. } => ErrorKind::Store,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which request a signed URL authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlOperation {
    Read,
    Write,
}

/// A backend-issued URL and the instant after which it stops being honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Object store operations used by the gateway.
///
/// Implementations classify every failure into [`StoreError`] and never
/// retry on their own; retry policy belongs to the external caller.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Bucket this client is bound to.
    fn bucket(&self) -> &str;

    /// Store `bytes` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()>;

    /// Fetch object metadata without the payload.
    ///
    /// Returns `StoreError::NotFound` if the object doesn't exist.
    async fn head(&self, key: &str) -> StoreResult<ObjectHead>;

    /// All keys in the bucket, in the order the backend returned them.
    async fn list(&self) -> StoreResult<Vec<String>>;

    /// Confirm the bucket answers, with a single bounded request.
    async fn ping(&self) -> StoreResult<()>;

    /// Remove an object.
    ///
    /// Returns `StoreError::NotFound` if there was nothing to delete.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Issue a URL granting `op` on `key` for `ttl`.
    ///
    /// The key is not checked for existence.
    async fn signed_url(&self, key: &str, op: UrlOperation, ttl: Duration)
    -> StoreResult<SignedUrl>;
}

/// Bounds a single backend call in time and ties it to the lifetime of the
/// inbound request.
#[derive(Debug, Clone, Copy)]
pub struct CallGuard {
    timeout: Duration,
}

impl CallGuard {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `call`, failing with `Timeout` once the deadline passes and with
    /// `Cancelled` as soon as `cancel` fires.
    pub async fn run<T, F>(
        &self,
        op: &'static str,
        cancel: &CancellationToken,
        call: F,
    ) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled { op }),
            res = tokio::time::timeout(self.timeout, call) => res.unwrap_or(Err(StoreError::Timeout {
                op,
                after: self.timeout,
            })),
        }
    }
}

/// Reject keys that cannot name an object in the bucket.
///
/// Keys are the last path segment of a gateway URL, so they must be
/// non-empty, bounded, free of control characters and `..`, and must not
/// start with `/`.
pub fn ensure_key_safe(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
