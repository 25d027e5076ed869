//! [`ObjectStoreClient`] implemented on top of the `object_store` crate.
//!
//! The same code path serves Amazon S3 (and S3-compatible endpoints) and the
//! in-process memory backend; only the underlying `ObjectStore` and `Signer`
//! differ.

use crate::{
    models::blob::ObjectHead,
    services::object_store_client::{
        ObjectStoreClient, SignedUrl, StoreError, StoreResult, UrlOperation, ensure_key_safe,
    },
};
use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectStore, PutOptions,
    aws::AmazonS3Builder,
    memory::InMemory,
    path::Path as ObjectPath,
    signer::Signer,
};
use rand::RngCore;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::debug;
use url::Url;

/// Connection settings for an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for MinIO/localstack.
    pub endpoint: Option<String>,
}

/// Object store client bound to a single bucket.
pub struct RemoteStore {
    bucket: String,
    store: Arc<dyn ObjectStore>,
    signer: Arc<dyn Signer>,
}

impl RemoteStore {
    pub fn new(
        bucket: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            store,
            signer,
        }
    }

    /// Amazon S3 backend. Credentials come from the usual `AWS_*` environment.
    pub fn s3(settings: &S3Settings) -> object_store::Result<Self> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&settings.bucket);
        if let Some(region) = &settings.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint);
            if endpoint.starts_with("http://") {
                builder = builder.with_allow_http(true);
            }
        }
        let s3 = Arc::new(builder.build()?);

        debug!(
            bucket = %settings.bucket,
            region = ?settings.region,
            "created S3 object store client"
        );
        Ok(Self::new(settings.bucket.clone(), s3.clone(), s3))
    }

    /// In-process backend. Returns the signer as well so callers can check
    /// issued URLs against it.
    pub fn in_memory(bucket: impl Into<String>) -> (Self, Arc<LocalSigner>) {
        let bucket = bucket.into();
        let signer = Arc::new(LocalSigner::new(bucket.clone()));
        let store = Self::new(bucket, Arc::new(InMemory::new()), signer.clone());
        (store, signer)
    }

    fn object_path(key: &str) -> StoreResult<ObjectPath> {
        ensure_key_safe(key)?;
        ObjectPath::parse(key).map_err(|_| StoreError::InvalidKey(key.to_string()))
    }
}

#[async_trait]
impl ObjectStoreClient for RemoteStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        let path = Self::object_path(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let size = bytes.len();
        self.store
            .put_opts(&path, bytes.into(), opts)
            .await
            .map_err(|err| StoreError::from_backend("put", key, err))?;

        debug!(key, size, content_type, "stored object");
        Ok(())
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        let path = Self::object_path(key)?;

        // A `head` GET returns attributes, which `ObjectStore::head` drops.
        let opts = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = self
            .store
            .get_opts(&path, opts)
            .await
            .map_err(|err| StoreError::from_backend("head", key, err))?;

        Ok(ObjectHead {
            size_bytes: result.meta.size,
            content_type: result
                .attributes
                .get(&Attribute::ContentType)
                .map(|v| v.to_string()),
            last_modified: result.meta.last_modified,
        })
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        let objects: Vec<_> = self
            .store
            .list(None)
            .try_collect()
            .await
            .map_err(|err| StoreError::from_backend("list", &self.bucket, err))?;

        Ok(objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        // One listing page at most; the rest of the stream is dropped unread.
        self.store
            .list(None)
            .try_next()
            .await
            .map_err(|err| StoreError::from_backend("ping", &self.bucket, err))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = Self::object_path(key)?;

        // S3 reports success for absent keys, so absence is checked up front.
        self.store
            .head(&path)
            .await
            .map_err(|err| StoreError::from_backend("delete", key, err))?;
        self.store
            .delete(&path)
            .await
            .map_err(|err| StoreError::from_backend("delete", key, err))?;

        debug!(key, "deleted object");
        Ok(())
    }

    async fn signed_url(
        &self,
        key: &str,
        op: UrlOperation,
        ttl: Duration,
    ) -> StoreResult<SignedUrl> {
        let path = Self::object_path(key)?;
        let method = match op {
            UrlOperation::Read => Method::GET,
            UrlOperation::Write => Method::PUT,
        };

        let expires_at = expiry_after(ttl);
        let url = self
            .signer
            .signed_url(method, &path, ttl)
            .await
            .map_err(|err| StoreError::from_backend("signed_url", key, err))?;

        Ok(SignedUrl {
            url: url.to_string(),
            expires_at,
        })
    }
}

fn expiry_after(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

struct Grant {
    path: String,
    method: Method,
    expires_at: DateTime<Utc>,
}

/// Signer for the memory backend.
///
/// Every issued URL carries a random token that maps to the granted path,
/// method and expiry, so [`LocalSigner::authorize`] can play the part of the
/// remote service validating a presented URL.
pub struct LocalSigner {
    bucket: String,
    grants: Mutex<HashMap<String, Grant>>,
}

impl LocalSigner {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            grants: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `url` allows `method` at instant `at`.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn authorize(&self, url: &str, method: &Method, at: DateTime<Utc>) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        let Some(token) = url
            .query_pairs()
            .find(|(name, _)| name == "signature")
            .map(|(_, value)| value.into_owned())
        else {
            return false;
        };

        let grants = match self.grants.lock() {
            Ok(grants) => grants,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Ok(path) = ObjectPath::from_url_path(url.path().trim_start_matches('/')) else {
            return false;
        };
        grants.get(&token).is_some_and(|grant| {
            grant.method == *method && path.to_string() == grant.path && at < grant.expires_at
        })
    }

    /// Grants still held, expired or not.
    #[cfg(test)]
    pub fn grant_count(&self) -> usize {
        match self.grants.lock() {
            Ok(grants) => grants.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn signed_url(
        &self,
        method: Method,
        path: &ObjectPath,
        expires_in: Duration,
    ) -> object_store::Result<Url> {
        let mut raw = [0u8; 16];
        rand::rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);
        let expires_at = expiry_after(expires_in);

        let url = Url::parse(&format!(
            "memory://{}/{}?expires={}&signature={}",
            self.bucket,
            path,
            expires_at.timestamp(),
            token
        ))
        .map_err(|err| object_store::Error::Generic {
            store: "LocalSigner",
            source: Box::new(err),
        })?;

        let mut grants = match self.grants.lock() {
            Ok(grants) => grants,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Utc::now();
        grants.retain(|_, grant| grant.expires_at > now);
        grants.insert(
            token,
            Grant {
                path: path.to_string(),
                method,
                expires_at,
            },
        );

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (RemoteStore, Arc<LocalSigner>) {
        RemoteStore::in_memory("test-bucket")
    }

    #[tokio::test]
    async fn test_put_then_head() {
        let (store, _) = store();
        store
            .put("1-aa.jpg", Bytes::from(vec![7u8; 2048]), "image/jpeg")
            .await
            .unwrap();

        let head = store.head("1-aa.jpg").await.unwrap();
        assert_eq!(head.size_bytes, 2048);
        assert_eq!(head.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let (store, _) = store();
        store
            .put("k.txt", Bytes::from_static(b"one"), "text/plain")
            .await
            .unwrap();
        store
            .put("k.txt", Bytes::from_static(b"three"), "text/markdown")
            .await
            .unwrap();

        let head = store.head("k.txt").await.unwrap();
        assert_eq!(head.size_bytes, 5);
        assert_eq!(head.content_type.as_deref(), Some("text/markdown"));
        assert_eq!(store.list().await.unwrap(), vec!["k.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_head_missing_is_not_found() {
        let (store, _) = store();
        let err = store.head("nope.txt").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (store, _) = store();
        assert!(store.list().await.unwrap().is_empty());

        for key in ["a.txt", "b.txt", "c.txt"] {
            store.put(key, Bytes::from_static(b"x"), "text/plain").await.unwrap();
        }
        store.delete("b.txt").await.unwrap();

        assert_eq!(
            store.list().await.unwrap(),
            vec!["a.txt".to_string(), "c.txt".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (store, _) = store();
        let err = store.delete("ghost.txt").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_unsafe_key_is_rejected() {
        let (store, _) = store();
        let err = store
            .put("../escape", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_signed_urls_are_scoped_and_expire() {
        let (store, signer) = store();
        let ttl = Duration::from_secs(60);

        let read = store.signed_url("a.txt", UrlOperation::Read, ttl).await.unwrap();
        let write = store.signed_url("a.txt", UrlOperation::Write, ttl).await.unwrap();
        let now = Utc::now();

        assert!(signer.authorize(&read.url, &Method::GET, now));
        assert!(!signer.authorize(&read.url, &Method::PUT, now));
        assert!(signer.authorize(&write.url, &Method::PUT, now));

        let later = read.expires_at + chrono::Duration::seconds(1);
        assert!(!signer.authorize(&read.url, &Method::GET, later));
        assert!(!signer.authorize("memory://test-bucket/a.txt?signature=forged", &Method::GET, now));
    }

    #[tokio::test]
    async fn test_signed_urls_for_escaped_keys_are_honored() {
        let (store, signer) = store();
        let ttl = Duration::from_secs(60);
        let now = Utc::now();

        for key in ["a b.txt", "résumé.pdf"] {
            let read = store.signed_url(key, UrlOperation::Read, ttl).await.unwrap();
            assert!(signer.authorize(&read.url, &Method::GET, now), "{key}: {}", read.url);
        }

        let other = store.signed_url("a b.txt", UrlOperation::Read, ttl).await.unwrap();
        let moved = other.url.replace("a%20b.txt", "a%20c.txt");
        assert!(!signer.authorize(&moved, &Method::GET, now));
    }

    #[tokio::test]
    async fn test_expired_grants_are_dropped() {
        let (store, signer) = store();

        for _ in 0..100 {
            store
                .signed_url("a.txt", UrlOperation::Read, Duration::ZERO)
                .await
                .unwrap();
        }
        let live = store
            .signed_url("a.txt", UrlOperation::Read, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(signer.grant_count(), 1);
        assert!(signer.authorize(&live.url, &Method::GET, Utc::now()));
    }

    #[tokio::test]
    async fn test_ping() {
        let (store, _) = store();
        store.ping().await.unwrap();

        for i in 0..50 {
            store
                .put(&format!("{i}.txt"), Bytes::from_static(b"x"), "text/plain")
                .await
                .unwrap();
        }
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_url_does_not_require_object() {
        let (store, _) = store();
        let url = store
            .signed_url("not-there.bin", UrlOperation::Read, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(url.url.contains("not-there.bin"));
    }
}
