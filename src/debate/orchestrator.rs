//! The debate loop.
//!
//! ```text
//! NotStarted -> Running --(stop / cap)--> Completed
//!                  |
//!                  +--(provisioning, selection, invocation error)--> Failed
//! ```
//!
//! Each turn: select speaker -> invoke capability -> append -> (if the
//! speaker is a terminator) evaluate termination -> count -> compare to cap.
//! Teardown runs once as the loop exits, before the final events are emitted.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{DebateError, SelectionError};
use super::history::{History, HistorySnapshot, Utterance};
use super::participant::{Participant, ParticipantRegistry};
use super::selection::SelectionStrategy;
use super::stream::{
    release_scope, DebateEvent, DebateOutcome, DebateStream, SessionStatus, SharedScope,
    StopReason,
};
use super::termination::{NeverStop, TerminationStrategy};
use crate::agents::Turn;
use crate::config::DebateConfig;
use crate::metrics::MetricsCollector;
use crate::resources::{ResourceBackends, ResourceScope, SessionResources, SourceDocument};

/// Composes participants, strategies and resources into one debate session.
pub struct DebateOrchestrator {
    registry: ParticipantRegistry,
    selection: Arc<dyn SelectionStrategy>,
    termination: Arc<dyn TerminationStrategy>,
    config: DebateConfig,
    document: Option<SourceDocument>,
    backends: Option<ResourceBackends>,
    metrics: MetricsCollector,
}

impl std::fmt::Debug for DebateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebateOrchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DebateOrchestrator {
    pub fn builder() -> DebateOrchestratorBuilder {
        DebateOrchestratorBuilder::default()
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    /// Starts the debate on `opening_prompt`.
    ///
    /// Nothing happens until the returned stream is polled. The stream yields
    /// one [`DebateEvent::Utterance`] per turn followed by exactly one
    /// [`DebateEvent::Ended`].
    pub fn run(self, opening_prompt: impl Into<String>) -> DebateStream {
        let opening_prompt: String = opening_prompt.into();
        let session_id = Uuid::new_v4();
        let (status_tx, _) = watch::channel(SessionStatus::NotStarted);
        let status_tx = Arc::new(status_tx);

        let scope: SharedScope = Arc::new(Mutex::new(
            self.backends
                .clone()
                .filter(|_| self.registry.requires_resources())
                .map(ResourceScope::new),
        ));

        let metrics = self.metrics;
        let events = self.into_events(session_id, opening_prompt, scope.clone(), status_tx.clone());
        DebateStream::new(session_id, Box::pin(events), scope, status_tx, metrics)
    }

    fn into_events(
        self,
        session_id: Uuid,
        opening_prompt: String,
        scope: SharedScope,
        status_tx: Arc<watch::Sender<SessionStatus>>,
    ) -> impl futures::Stream<Item = DebateEvent> + Send {
        let this = self;
        async_stream::stream! {
            status_tx.send_replace(SessionStatus::Running);
            info!(
                session = %session_id,
                participants = ?this.registry.names(),
                max_iterations = this.config.max_iterations,
                "Debate started"
            );

            let mut resources = SessionResources::default();
            if let Some(document) = this.document.as_ref() {
                let mut guard = scope.lock().await;
                if let Some(resource_scope) = guard.as_mut() {
                    match resource_scope.provision(document).await {
                        Ok(provisioned) => resources = provisioned,
                        Err(failure) => {
                            drop(guard);
                            let outcome = DebateOutcome::Failed {
                                error: failure.error,
                                iterations: 0,
                                teardown_errors: failure.teardown_errors,
                            };
                            this.finish(session_id, &status_tx, &outcome);
                            yield DebateEvent::Ended(outcome);
                            return;
                        }
                    }
                }
            }

            let mut history = History::new(opening_prompt);
            let mut iterations = 0usize;

            loop {
                let snapshot = history.snapshot();
                let (speaker, content) = match this.take_turn(session_id, &snapshot, &resources).await {
                    Ok(turn) => turn,
                    Err(error) => {
                        let teardown_errors = release_scope(&scope).await;
                        let outcome = DebateOutcome::Failed { error, iterations, teardown_errors };
                        this.finish(session_id, &status_tx, &outcome);
                        yield DebateEvent::Ended(outcome);
                        return;
                    }
                };

                let utterance = Utterance::new(history.next_sequence(), speaker, content);
                if let Err(e) = history.append(utterance.clone()) {
                    let teardown_errors = release_scope(&scope).await;
                    let outcome = DebateOutcome::Failed {
                        error: DebateError::from(e),
                        iterations,
                        teardown_errors,
                    };
                    this.finish(session_id, &status_tx, &outcome);
                    yield DebateEvent::Ended(outcome);
                    return;
                }

                let mut stop = None;
                if this.config.triggers_termination(&utterance.author)
                    && this.evaluate_termination(session_id, &history.snapshot()).await
                {
                    stop = Some(StopReason::TerminationStrategy);
                }

                iterations += 1;
                if stop.is_none() && iterations >= this.config.max_iterations {
                    stop = Some(StopReason::IterationCap);
                }

                match stop {
                    None => {
                        yield DebateEvent::Utterance(utterance);
                    }
                    Some(reason) => {
                        let teardown_errors = release_scope(&scope).await;
                        let outcome = DebateOutcome::Completed { reason, iterations, teardown_errors };
                        this.finish(session_id, &status_tx, &outcome);
                        yield DebateEvent::Utterance(utterance);
                        yield DebateEvent::Ended(outcome);
                        return;
                    }
                }
            }
        }
    }

    /// Selects the next speaker and asks their capability for an utterance.
    async fn take_turn(
        &self,
        session_id: Uuid,
        history: &HistorySnapshot,
        resources: &SessionResources,
    ) -> Result<(String, String), DebateError> {
        let name = self.selection.select(history, &self.registry).await?;
        let participant: &Participant = self
            .registry
            .get(&name)
            .ok_or(SelectionError::UnknownParticipant(name.clone()))?;

        debug!(
            session = %session_id,
            sequence = history.len(),
            speaker = %name,
            "Invoking participant"
        );

        let turn = Turn {
            speaker: participant.name(),
            role: participant.role(),
            history,
            resources,
        };

        let started = Instant::now();
        let result = participant.capability().next_utterance(&turn).await;
        self.metrics.record_turn(
            participant.name(),
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );

        match result {
            Ok(content) => Ok((name, content)),
            Err(source) => Err(DebateError::AgentInvocation {
                participant: name,
                source,
            }),
        }
    }

    /// Asks the termination strategy; a failing check counts as "continue".
    async fn evaluate_termination(&self, session_id: Uuid, history: &HistorySnapshot) -> bool {
        match self.termination.should_stop(history).await {
            Ok(stop) => {
                self.metrics
                    .record_termination_check(if stop { "stop" } else { "continue" });
                debug!(session = %session_id, turns = history.len(), stop, "Termination evaluated");
                stop
            }
            Err(e) => {
                self.metrics.record_termination_check("error");
                warn!(
                    session = %session_id,
                    error = %e,
                    "Termination check failed, continuing under the iteration cap"
                );
                false
            }
        }
    }

    fn finish(
        &self,
        session_id: Uuid,
        status_tx: &watch::Sender<SessionStatus>,
        outcome: &DebateOutcome,
    ) {
        status_tx.send_replace(outcome.status());
        for release in outcome.teardown_errors() {
            warn!(session = %session_id, error = %release, "Teardown error");
        }

        match outcome {
            DebateOutcome::Completed {
                reason, iterations, ..
            } => {
                self.metrics.record_debate("completed");
                info!(session = %session_id, ?reason, iterations, "Debate completed");
            }
            DebateOutcome::Failed {
                error: e,
                iterations,
                ..
            } => {
                self.metrics.record_debate("failed");
                error!(
                    session = %session_id,
                    kind = e.kind(),
                    error = %e,
                    iterations,
                    "Debate failed"
                );
            }
        }
    }
}

/// Builder for [`DebateOrchestrator`]. Validation happens in [`build`](Self::build).
#[derive(Default)]
pub struct DebateOrchestratorBuilder {
    participants: Vec<Participant>,
    selection: Option<Arc<dyn SelectionStrategy>>,
    termination: Option<Arc<dyn TerminationStrategy>>,
    config: DebateConfig,
    document: Option<SourceDocument>,
    backends: Option<ResourceBackends>,
}

impl DebateOrchestratorBuilder {
    pub fn participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    pub fn participants(mut self, participants: impl IntoIterator<Item = Participant>) -> Self {
        self.participants.extend(participants);
        self
    }

    pub fn selection(mut self, strategy: impl SelectionStrategy + 'static) -> Self {
        self.selection = Some(Arc::new(strategy));
        self
    }

    pub fn selection_arc(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.selection = Some(strategy);
        self
    }

    pub fn termination(mut self, strategy: impl TerminationStrategy + 'static) -> Self {
        self.termination = Some(Arc::new(strategy));
        self
    }

    pub fn termination_arc(mut self, strategy: Arc<dyn TerminationStrategy>) -> Self {
        self.termination = Some(strategy);
        self
    }

    pub fn config(mut self, config: DebateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn document(mut self, document: SourceDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn backends(mut self, backends: ResourceBackends) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Validates the session setup.
    ///
    /// # Errors
    ///
    /// `DebateError::Configuration` when the registry is invalid, no selection
    /// strategy is set, the debate config does not fit the registry, or a
    /// resource-bound participant has no document or backends to draw on.
    pub fn build(self) -> Result<DebateOrchestrator, DebateError> {
        let registry = ParticipantRegistry::new(self.participants)?;

        let selection = self.selection.ok_or_else(|| {
            DebateError::Configuration("a selection strategy is required".to_string())
        })?;

        self.config.validate(&registry)?;

        if registry.requires_resources() {
            let bound: Vec<&str> = registry
                .iter()
                .filter(|p| p.requires_resources())
                .map(Participant::name)
                .collect();
            if self.document.is_none() {
                return Err(DebateError::Configuration(format!(
                    "participants {:?} need a source document",
                    bound
                )));
            }
            if self.backends.is_none() {
                return Err(DebateError::Configuration(format!(
                    "participants {:?} need resource backends",
                    bound
                )));
            }
        }

        Ok(DebateOrchestrator {
            registry,
            selection,
            termination: self.termination.unwrap_or_else(|| Arc::new(NeverStop)),
            config: self.config,
            document: self.document,
            backends: self.backends,
            metrics: MetricsCollector::new(),
        })
    }
}
