//! Shared fixtures for the debate lifecycle tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use symposium::agents::{AgentCapability, CapabilityKind, Turn};
use symposium::debate::{
    AgentInvocationError, HistorySnapshot, Participant, ParticipantRegistry, SelectionError,
    SelectionStrategy, TerminationPolicyError, TerminationStrategy,
};
use symposium::resources::{
    ConversationService, DocumentId, DocumentStore, IndexId, IndexService, ResourceBackends,
    SourceDocument, ThreadId, ThreadService,
};
use symposium::BackendError;

/// In-memory backend that records every call and can be told to fail one.
#[derive(Default)]
pub struct RecordingBackend {
    log: Mutex<Vec<String>>,
    failing: Mutex<Vec<&'static str>>,
    close_delay: Option<Duration>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every call to `operation` (e.g. `"build_index"`) fail.
    pub fn failing_on(operations: &[&'static str]) -> Arc<Self> {
        let backend = Self::default();
        backend
            .failing
            .lock()
            .unwrap()
            .extend(operations.iter().copied());
        Arc::new(backend)
    }

    /// `close_thread` sleeps for `delay` before it is recorded.
    pub fn with_close_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            close_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Release calls only, in the order they happened.
    pub fn releases(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|entry| entry.starts_with("delete_") || entry.starts_with("close_"))
            .collect()
    }

    pub fn backends(self: &Arc<Self>) -> ResourceBackends {
        ResourceBackends::from_shared(self.clone())
    }

    fn call(&self, operation: &'static str, id: &str) -> Result<(), BackendError> {
        self.log.lock().unwrap().push(format!("{operation}:{id}"));
        if self.failing.lock().unwrap().contains(&operation) {
            return Err(BackendError::ApiError {
                code: 500,
                message: format!("{operation} unavailable"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RecordingBackend {
    async fn ingest(&self, document: &SourceDocument) -> Result<DocumentId, BackendError> {
        self.call("ingest", &document.name)?;
        Ok(DocumentId("doc-1".to_string()))
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<(), BackendError> {
        self.call("delete_document", id.as_str())
    }
}

#[async_trait]
impl IndexService for RecordingBackend {
    async fn build_index(&self, document: &DocumentId) -> Result<IndexId, BackendError> {
        self.call("build_index", document.as_str())?;
        Ok(IndexId("idx-1".to_string()))
    }

    async fn delete_index(&self, id: &IndexId) -> Result<(), BackendError> {
        self.call("delete_index", id.as_str())
    }
}

#[async_trait]
impl ThreadService for RecordingBackend {
    async fn open_thread(&self, index: &IndexId) -> Result<ThreadId, BackendError> {
        self.call("open_thread", index.as_str())?;
        Ok(ThreadId("thr-1".to_string()))
    }

    async fn close_thread(&self, id: &ThreadId) -> Result<(), BackendError> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.call("close_thread", id.as_str())
    }
}

#[async_trait]
impl ConversationService for RecordingBackend {
    async fn post_message(
        &self,
        thread: &ThreadId,
        author: &str,
        _content: &str,
    ) -> Result<(), BackendError> {
        self.call("post_message", &format!("{}/{author}", thread.as_str()))
    }

    async fn run(&self, thread: &ThreadId) -> Result<String, BackendError> {
        self.call("run", thread.as_str())?;
        Ok("From the dialogues: the Good is the highest form.".to_string())
    }
}

/// Replies with a fixed line; fails when asked to produce turn `fail_at`
/// (1-based), and can claim to need session resources.
pub struct ScriptedAgent {
    fail_at: Option<usize>,
    kind: CapabilityKind,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            fail_at: None,
            kind: CapabilityKind::Stateless,
        }
    }

    pub fn failing_at(turn: usize) -> Self {
        Self {
            fail_at: Some(turn),
            ..Self::new()
        }
    }

    pub fn resource_bound() -> Self {
        Self {
            kind: CapabilityKind::ResourceBound,
            ..Self::new()
        }
    }
}

#[async_trait]
impl AgentCapability for ScriptedAgent {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    async fn next_utterance(&self, turn: &Turn<'_>) -> Result<String, AgentInvocationError> {
        let number = turn.history.len() + 1;
        if self.fail_at == Some(number) {
            return Err(AgentInvocationError::Other(format!(
                "{} lost the thread",
                turn.speaker
            )));
        }
        if self.kind == CapabilityKind::ResourceBound && turn.resources.thread.is_none() {
            return Err(AgentInvocationError::MissingResource("thread"));
        }
        Ok(format!("{} on turn {number}", turn.speaker))
    }
}

/// Builds participants named `names`, all backed by [`ScriptedAgent::new`].
pub fn participants(names: &[&str]) -> Vec<Participant> {
    names
        .iter()
        .map(|name| Participant::new(*name, "philosopher", Arc::new(ScriptedAgent::new())))
        .collect()
}

/// Termination decided by a closure over the history.
pub struct FnTermination<F>(pub F);

#[async_trait]
impl<F> TerminationStrategy for FnTermination<F>
where
    F: Fn(&HistorySnapshot) -> Result<bool, TerminationPolicyError> + Send + Sync,
{
    async fn should_stop(&self, history: &HistorySnapshot) -> Result<bool, TerminationPolicyError> {
        (self.0)(history)
    }
}

/// Always names the same speaker, registered or not.
pub struct FixedSelection(pub &'static str);

#[async_trait]
impl SelectionStrategy for FixedSelection {
    async fn select(
        &self,
        _history: &HistorySnapshot,
        _participants: &ParticipantRegistry,
    ) -> Result<String, SelectionError> {
        Ok(self.0.to_string())
    }
}

pub fn document() -> SourceDocument {
    SourceDocument::new("Plato.pdf", b"The Republic".to_vec())
}
