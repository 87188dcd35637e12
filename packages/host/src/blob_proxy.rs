//! Blob storage on behalf of the worker.
//!
//! Every `blobstore` request gets exactly one `response` envelope. Requests
//! run one at a time in arrival order, so responses leave in request order
//! and the worker can pair them up without an id.

use std::collections::VecDeque;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use workerbridge_blob_store::BlobStore;
use workerbridge_envelope::{BlobRequest, HostEvent};

/// An in-flight request, resolving to its response event.
pub type PendingBlobRequest = BoxFuture<'static, HostEvent>;

pub struct BlobStoreProxy {
    store: Arc<dyn BlobStore>,
    pending: VecDeque<PendingBlobRequest>,
}

impl BlobStoreProxy {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            pending: VecDeque::new(),
        }
    }

    /// Load a blob. A missing or unreadable blob answers with no bytes.
    pub fn load(&self, store_id: String, blob_id: String) -> PendingBlobRequest {
        let store = Arc::clone(&self.store);
        async move {
            match store.load(&store_id, &blob_id).await {
                Ok(bytes) => HostEvent::BlobLoaded { blob: Some(bytes) },
                Err(error) => {
                    tracing::debug!(store = %store_id, blob = %blob_id, %error, "blob load failed");
                    HostEvent::BlobLoaded { blob: None }
                }
            }
        }
        .boxed()
    }

    /// Store a blob. Failure is reported through the response's error flag.
    pub fn store(&self, store_id: String, blob_id: String, bytes: Vec<u8>) -> PendingBlobRequest {
        let store = Arc::clone(&self.store);
        async move {
            let result = store.store(&store_id, &blob_id, bytes).await;
            if let Err(error) = &result {
                tracing::warn!(store = %store_id, blob = %blob_id, %error, "blob store failed");
            }
            HostEvent::BlobStored {
                error: result.is_err(),
            }
        }
        .boxed()
    }

    /// Queue a request behind any already pending.
    pub fn submit(&mut self, request: BlobRequest) {
        let pending = match request {
            BlobRequest::Load { store, blob } => self.load(store, blob),
            BlobRequest::Store { store, blob, bytes } => self.store(store, blob, bytes),
        };
        self.pending.push_back(pending);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drive the oldest request.
    ///
    /// `Ready(None)` means nothing is pending. The request stays queued until
    /// it completes, so dropping the caller's future loses nothing.
    pub fn poll_front(&mut self, cx: &mut Context<'_>) -> Poll<Option<HostEvent>> {
        let Some(front) = self.pending.front_mut() else {
            return Poll::Ready(None);
        };
        match front.as_mut().poll(cx) {
            Poll::Ready(event) => {
                self.pending.pop_front();
                Poll::Ready(Some(event))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Wait for the oldest request's response.
    pub async fn next_response(&mut self) -> Option<HostEvent> {
        futures::future::poll_fn(|cx| self.poll_front(cx)).await
    }
}
