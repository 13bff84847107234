//! Acquire-in-order, release-in-reverse lifecycle for session resources.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    DocumentId, IndexId, ResourceBackends, ResourceKind, SessionResources, SourceDocument,
    ThreadId,
};
use crate::debate::DebateError;
use crate::error::BackendError;
use crate::metrics::MetricsCollector;

/// A resource the scope currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHandle {
    Document(DocumentId),
    Index(IndexId),
    Thread(ThreadId),
}

impl ResourceHandle {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Document(_) => ResourceKind::Document,
            Self::Index(_) => ResourceKind::Index,
            Self::Thread(_) => ResourceKind::Thread,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Document(id) => id.as_str(),
            Self::Index(id) => id.as_str(),
            Self::Thread(id) => id.as_str(),
        }
    }
}

/// A release call that failed. The resource is not retried.
#[derive(Debug, Error)]
#[error("failed to release {kind} '{id}': {source}")]
pub struct ReleaseError {
    pub kind: ResourceKind,
    pub id: String,
    #[source]
    pub source: BackendError,
}

/// Provisioning error together with the outcome of its compensating release.
#[derive(Debug)]
pub struct ProvisionFailure {
    pub error: DebateError,
    pub teardown_errors: Vec<ReleaseError>,
}

/// Owns every external resource a session acquires.
///
/// Resources are released in reverse acquisition order, at most once each.
/// If the scope is dropped while still holding resources, release is handed
/// to the current tokio runtime; outside a runtime the leak is logged.
pub struct ResourceScope {
    backends: ResourceBackends,
    held: Vec<ResourceHandle>,
    metrics: MetricsCollector,
}

impl ResourceScope {
    pub fn new(backends: ResourceBackends) -> Self {
        Self {
            backends,
            held: Vec::new(),
            metrics: MetricsCollector::new(),
        }
    }

    /// Resources currently held, in acquisition order.
    pub fn held(&self) -> &[ResourceHandle] {
        &self.held
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Ingests the document, builds an index over it and opens a thread on
    /// that index. A failing step releases whatever the earlier steps
    /// acquired before returning.
    pub async fn provision(
        &mut self,
        document: &SourceDocument,
    ) -> Result<SessionResources, ProvisionFailure> {
        let document_id = match self.backends.documents.ingest(document).await {
            Ok(id) => id,
            Err(source) => return Err(self.fail(1, ResourceKind::Document, source).await),
        };
        self.track(ResourceHandle::Document(document_id.clone()));

        let index_id = match self.backends.indexes.build_index(&document_id).await {
            Ok(id) => id,
            Err(source) => return Err(self.fail(2, ResourceKind::Index, source).await),
        };
        self.track(ResourceHandle::Index(index_id.clone()));

        let thread_id = match self.backends.threads.open_thread(&index_id).await {
            Ok(id) => id,
            Err(source) => return Err(self.fail(3, ResourceKind::Thread, source).await),
        };
        self.track(ResourceHandle::Thread(thread_id.clone()));

        info!(
            document = %document_id,
            index = %index_id,
            thread = %thread_id,
            "Session resources provisioned"
        );

        Ok(SessionResources {
            document: Some(document_id),
            index: Some(index_id),
            thread: Some(thread_id),
        })
    }

    /// Releases everything held, newest first. Calling it again is a no-op.
    ///
    /// Every release is attempted even if an earlier one fails. A handle
    /// leaves the held list only once its release call has returned, so if
    /// this future is dropped midway the remainder is still owned by the
    /// scope and a later `release_all` (or the drop of the scope) finishes it.
    pub async fn release_all(&mut self) -> Vec<ReleaseError> {
        let mut errors = Vec::new();
        while let Some(handle) = self.held.last().cloned() {
            let result = release_one(&self.backends, &handle).await;
            self.held.pop();
            if let Err(e) = record_release(self.metrics, handle, result) {
                errors.push(e);
            }
        }
        errors
    }

    fn track(&mut self, handle: ResourceHandle) {
        debug!(kind = %handle.kind(), id = handle.id(), "Resource acquired");
        self.metrics.resource_acquired(handle.kind().as_str());
        self.held.push(handle);
    }

    async fn fail(
        &mut self,
        step: usize,
        kind: ResourceKind,
        source: BackendError,
    ) -> ProvisionFailure {
        warn!(step, kind = %kind, error = %source, "Resource provisioning failed");
        let teardown_errors = self.release_all().await;
        ProvisionFailure {
            error: DebateError::ResourceProvisioning { step, kind, source },
            teardown_errors,
        }
    }
}

impl std::fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceScope")
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }

        let handles = std::mem::take(&mut self.held);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(
                    count = handles.len(),
                    "Resource scope dropped while holding resources, releasing in background"
                );
                let backends = self.backends.clone();
                let metrics = self.metrics;
                runtime.spawn(async move {
                    release_handles(&backends, handles, metrics).await;
                });
            }
            Err(_) => {
                for handle in &handles {
                    warn!(
                        kind = %handle.kind(),
                        id = handle.id(),
                        "Resource leaked: scope dropped outside a tokio runtime"
                    );
                }
            }
        }
    }
}

async fn release_handles(
    backends: &ResourceBackends,
    handles: Vec<ResourceHandle>,
    metrics: MetricsCollector,
) -> Vec<ReleaseError> {
    let mut errors = Vec::new();
    for handle in handles.into_iter().rev() {
        let result = release_one(backends, &handle).await;
        if let Err(e) = record_release(metrics, handle, result) {
            errors.push(e);
        }
    }
    errors
}

fn record_release(
    metrics: MetricsCollector,
    handle: ResourceHandle,
    result: Result<(), BackendError>,
) -> Result<(), ReleaseError> {
    let kind = handle.kind();
    match result {
        Ok(()) => {
            debug!(kind = %kind, id = handle.id(), "Resource released");
            metrics.resource_released(kind.as_str(), true);
            Ok(())
        }
        Err(source) => {
            warn!(kind = %kind, id = handle.id(), error = %source, "Resource release failed");
            metrics.resource_released(kind.as_str(), false);
            Err(ReleaseError {
                kind,
                id: handle.id().to_string(),
                source,
            })
        }
    }
}

async fn release_one(
    backends: &ResourceBackends,
    handle: &ResourceHandle,
) -> Result<(), BackendError> {
    match handle {
        ResourceHandle::Document(id) => backends.documents.delete_document(id).await,
        ResourceHandle::Index(id) => backends.indexes.delete_index(id).await,
        ResourceHandle::Thread(id) => backends.threads.close_thread(id).await,
    }
}
