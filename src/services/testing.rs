//! Test doubles for [`ObjectStoreClient`].

use crate::{
    models::blob::ObjectHead,
    services::{
        object_store_client::{ObjectStoreClient, SignedUrl, StoreError, StoreResult, UrlOperation},
        remote_store::{LocalSigner, RemoteStore},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Memory-backed store whose `head` calls can be made to fail or stall per
/// key. Tracks the peak number of concurrent `head` calls and counts full
/// listings.
pub struct ScriptedStore {
    inner: RemoteStore,
    pub signer: Arc<LocalSigner>,
    failing_heads: HashSet<String>,
    head_delays: HashMap<String, Duration>,
    unreachable: bool,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    list_calls: AtomicUsize,
}

/// Holds one slot of `in_flight` until dropped, including when the `head`
/// future is abandoned mid-call.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn injected(op: &'static str, key: &str) -> StoreError {
    StoreError::Backend {
        op,
        key: key.to_string(),
        source: object_store::Error::Generic {
            store: "ScriptedStore",
            source: "injected failure".into(),
        },
    }
}

impl ScriptedStore {
    pub fn new() -> Self {
        let (inner, signer) = RemoteStore::in_memory("test-bucket");
        Self {
            inner,
            signer,
            failing_heads: HashSet::new(),
            head_delays: HashMap::new(),
            unreachable: false,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_head(mut self, key: &str) -> Self {
        self.failing_heads.insert(key.to_string());
        self
    }

    pub fn delay_head(mut self, key: &str, delay: Duration) -> Self {
        self.head_delays.insert(key.to_string(), delay);
        self
    }

    /// Make `ping` fail.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub async fn seed(&self, key: &str, len: usize, content_type: &str) {
        self.inner
            .put(key, Bytes::from(vec![0u8; len]), content_type)
            .await
            .unwrap();
    }
}

#[async_trait]
impl ObjectStoreClient for ScriptedStore {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        self.inner.put(key, bytes, content_type).await
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _slot = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.head_delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_heads.contains(key) {
            return Err(injected("head", key));
        }
        self.inner.head(key).await
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list().await
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.unreachable {
            return Err(injected("ping", self.inner.bucket()));
        }
        self.inner.ping().await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn signed_url(
        &self,
        key: &str,
        op: UrlOperation,
        ttl: Duration,
    ) -> StoreResult<SignedUrl> {
        self.inner.signed_url(key, op, ttl).await
    }
}
