//! The lazy, pull-based sequence a running debate produces.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::error::DebateError;
use super::history::Utterance;
use crate::metrics::MetricsCollector;
use crate::resources::{ReleaseError, ResourceScope};

/// Lifecycle of one debate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
    /// The consumer stopped the debate through [`DebateStream::cancel`].
    Cancelled,
}

impl SessionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Why a debate completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The termination strategy answered true.
    TerminationStrategy,
    /// The iteration cap was reached.
    IterationCap,
}

/// End-of-debate marker.
#[derive(Debug)]
pub enum DebateOutcome {
    Completed {
        reason: StopReason,
        iterations: usize,
        teardown_errors: Vec<ReleaseError>,
    },
    Failed {
        error: DebateError,
        iterations: usize,
        teardown_errors: Vec<ReleaseError>,
    },
}

impl DebateOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn iterations(&self) -> usize {
        match self {
            Self::Completed { iterations, .. } | Self::Failed { iterations, .. } => *iterations,
        }
    }

    pub fn error(&self) -> Option<&DebateError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Completed { .. } => None,
        }
    }

    pub fn teardown_errors(&self) -> &[ReleaseError] {
        match self {
            Self::Completed {
                teardown_errors, ..
            }
            | Self::Failed {
                teardown_errors, ..
            } => teardown_errors,
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_completed() {
            SessionStatus::Completed
        } else {
            SessionStatus::Failed
        }
    }
}

/// One element of the debate sequence.
#[derive(Debug)]
pub enum DebateEvent {
    Utterance(Utterance),
    /// Always the last event; resources are already released when it arrives.
    Ended(DebateOutcome),
}

/// Everything a debate produced, gathered by [`DebateStream::collect_transcript`].
#[derive(Debug)]
pub struct DebateTranscript {
    pub session_id: Uuid,
    pub utterances: Vec<Utterance>,
    /// `None` only if the stream stopped without an end marker.
    pub outcome: Option<DebateOutcome>,
}

pub(crate) type EventStream = Pin<Box<dyn Stream<Item = DebateEvent> + Send>>;
pub(crate) type SharedScope = Arc<Mutex<Option<ResourceScope>>>;

/// Handle to a running debate.
///
/// Each utterance becomes available only after the speaker's capability
/// returns; nothing runs until the stream is polled. Dropping the handle
/// early still releases the session's resources (in the background), while
/// [`cancel`](Self::cancel) releases them before returning.
pub struct DebateStream {
    session_id: Uuid,
    inner: Option<EventStream>,
    scope: SharedScope,
    status_tx: Arc<watch::Sender<SessionStatus>>,
    status_rx: watch::Receiver<SessionStatus>,
    metrics: MetricsCollector,
}

impl DebateStream {
    pub(crate) fn new(
        session_id: Uuid,
        inner: EventStream,
        scope: SharedScope,
        status_tx: Arc<watch::Sender<SessionStatus>>,
        metrics: MetricsCollector,
    ) -> Self {
        let status_rx = status_tx.subscribe();
        Self {
            session_id,
            inner: Some(inner),
            scope,
            status_tx,
            status_rx,
            metrics,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current session status.
    pub fn status(&self) -> SessionStatus {
        *self.status_rx.borrow()
    }

    /// A receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Stops the debate and waits for its resources to be released.
    ///
    /// Returns the release failures. Cancelling a finished debate is a no-op.
    pub async fn cancel(mut self) -> Vec<ReleaseError> {
        self.inner.take();

        let errors = release_scope(&self.scope).await;

        let cancelled = self.status_tx.send_if_modified(|status| {
            if status.is_finished() {
                false
            } else {
                *status = SessionStatus::Cancelled;
                true
            }
        });
        if cancelled {
            self.metrics.record_debate("cancelled");
            tracing::info!(
                session = %self.session_id,
                teardown_errors = errors.len(),
                "Debate cancelled"
            );
        }
        errors
    }

    /// Drives the debate to its end and gathers every event.
    pub async fn collect_transcript(mut self) -> DebateTranscript {
        let mut utterances = Vec::new();
        let mut outcome = None;
        while let Some(event) = self.next().await {
            match event {
                DebateEvent::Utterance(u) => utterances.push(u),
                DebateEvent::Ended(o) => outcome = Some(o),
            }
        }
        DebateTranscript {
            session_id: self.session_id,
            utterances,
            outcome,
        }
    }
}

impl Stream for DebateStream {
    type Item = DebateEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut() {
            Some(inner) => inner.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl fmt::Debug for DebateStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebateStream")
            .field("session_id", &self.session_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Releases whatever the session scope still holds.
pub(crate) async fn release_scope(scope: &Mutex<Option<ResourceScope>>) -> Vec<ReleaseError> {
    let mut guard = scope.lock().await;
    match guard.as_mut() {
        Some(scope) => scope.release_all().await,
        None => Vec::new(),
    }
}
