//! Session-scoped external resources.
//!
//! A debate with a retrieval-backed participant needs three artifacts that
//! live outside the process: an ingested document, an index derived from it,
//! and a conversation thread bound to that index. This module defines the
//! collaborator traits that create and delete them, the typed ids that name
//! them, and ([`scope`]) the lifecycle manager that guarantees their release.
//!
//! # Architecture
//!
//! ```text
//! ResourceScope::provision(document)
//!     |
//!     |-- step 1: DocumentStore::ingest(bytes)      -> DocumentId
//!     |-- step 2: IndexService::build_index(doc)    -> IndexId
//!     |-- step 3: ThreadService::open_thread(index) -> ThreadId
//!     v
//! SessionResources { document, index, thread }
//!
//! ResourceScope::release_all()   (reverse order, exactly once)
//! ```

pub mod assistants;
pub mod scope;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub use assistants::{AssistantsClient, AssistantsConfig};
pub use scope::{ProvisionFailure, ReleaseError, ResourceHandle, ResourceScope};

/// Identifier of an ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Identifier of a retrieval index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexId(pub String);

/// Identifier of a persistent conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl IndexId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ThreadId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of external resource, in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Document,
    Index,
    Thread,
}

impl ResourceKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Index => "index",
            Self::Thread => "thread",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source material a retrieval-backed participant draws on.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name reported to the ingestion service.
    pub name: String,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a document from disk, naming it after the file.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self { name, bytes })
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Document-ingestion service.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn ingest(&self, document: &SourceDocument) -> Result<DocumentId, BackendError>;

    async fn delete_document(&self, id: &DocumentId) -> Result<(), BackendError>;
}

/// Index-construction service.
#[async_trait]
pub trait IndexService: Send + Sync {
    async fn build_index(&self, document: &DocumentId) -> Result<IndexId, BackendError>;

    async fn delete_index(&self, id: &IndexId) -> Result<(), BackendError>;
}

/// Conversation-handle service.
#[async_trait]
pub trait ThreadService: Send + Sync {
    async fn open_thread(&self, index: &IndexId) -> Result<ThreadId, BackendError>;

    async fn close_thread(&self, id: &ThreadId) -> Result<(), BackendError>;
}

/// Operations a resource-bound participant performs on an open thread.
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Adds a message written by `author` to the thread.
    async fn post_message(
        &self,
        thread: &ThreadId,
        author: &str,
        content: &str,
    ) -> Result<(), BackendError>;

    /// Asks the thread's assistant for its next reply.
    async fn run(&self, thread: &ThreadId) -> Result<String, BackendError>;
}

/// The set of backends a session provisions its resources from.
#[derive(Clone)]
pub struct ResourceBackends {
    pub documents: Arc<dyn DocumentStore>,
    pub indexes: Arc<dyn IndexService>,
    pub threads: Arc<dyn ThreadService>,
}

impl ResourceBackends {
    /// Uses one object for all three services.
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: DocumentStore + IndexService + ThreadService + 'static,
    {
        Self {
            documents: backend.clone(),
            indexes: backend.clone(),
            threads: backend,
        }
    }
}

impl fmt::Debug for ResourceBackends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBackends").finish_non_exhaustive()
    }
}

/// Resource ids visible to participants during a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionResources {
    pub document: Option<DocumentId>,
    pub index: Option<IndexId>,
    pub thread: Option<ThreadId>,
}

impl SessionResources {
    pub fn is_empty(&self) -> bool {
        self.document.is_none() && self.index.is_none() && self.thread.is_none()
    }
}
