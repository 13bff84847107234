//! Stateless participant backed by a chat completion model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{AgentCapability, PersonaTemplate, Turn};
use crate::debate::AgentInvocationError;
use crate::llm::{GenerationRequest, LlmProvider, Message};

/// Default upper bound on a single completion call.
pub const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(90);

/// Replays the whole debate to a completion model on every turn.
///
/// The participant's own earlier turns are sent as `assistant` messages and
/// everyone else's as named `user` messages, so the model sees the debate
/// from its participant's point of view.
pub struct CompletionAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
    instructions: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl CompletionAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            instructions: instructions.into(),
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_INVOCATION_TIMEOUT,
        }
    }

    /// Configures the agent from a persona's instructions and sampling settings.
    pub fn from_persona(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        persona: &PersonaTemplate,
    ) -> Self {
        Self {
            temperature: persona.temperature,
            max_tokens: persona.max_tokens,
            ..Self::new(provider, model, persona.instructions.clone())
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request(&self, turn: &Turn<'_>) -> GenerationRequest {
        let mut messages = Vec::with_capacity(turn.history.len() + 2);
        messages.push(Message::system(format!(
            "{}\n\nYou are {} ({}) in a moderated debate. Reply with your next contribution only.",
            self.instructions.trim_end(),
            turn.speaker,
            turn.role
        )));
        messages.push(Message::user(turn.history.opening_prompt()));

        for utterance in turn.history.utterances() {
            let message = if utterance.author == turn.speaker {
                Message::assistant(utterance.content.clone())
            } else {
                Message::user(utterance.content.clone())
            };
            messages.push(message.with_name(&utterance.author));
        }

        let mut request = GenerationRequest::new(self.model.clone(), messages);
        if let Some(t) = self.temperature {
            request = request.with_temperature(t);
        }
        if let Some(m) = self.max_tokens {
            request = request.with_max_tokens(m);
        }
        request
    }
}

#[async_trait]
impl AgentCapability for CompletionAgent {
    async fn next_utterance(&self, turn: &Turn<'_>) -> Result<String, AgentInvocationError> {
        let request = self.build_request(turn);

        tracing::debug!(
            speaker = turn.speaker,
            model = %self.model,
            messages = request.messages.len(),
            "Requesting completion"
        );

        let response = tokio::time::timeout(self.timeout, self.provider.generate(request))
            .await
            .map_err(|_| AgentInvocationError::Timeout {
                limit: self.timeout,
            })??;

        response
            .first_content()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .ok_or(AgentInvocationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::{HistorySnapshot, Utterance};
    use crate::error::LlmError;
    use crate::llm::mock::MockLlmProvider;
    use crate::llm::GenerationResponse;
    use crate::resources::SessionResources;

    fn snapshot() -> HistorySnapshot {
        HistorySnapshot::from_parts(
            "Is virtue teachable?",
            vec![
                Utterance::new(0, "Socrates", "What is virtue?"),
                Utterance::new(1, "Aristotle", "A mean between extremes."),
            ],
        )
    }

    fn turn<'a>(history: &'a HistorySnapshot, resources: &'a SessionResources) -> Turn<'a> {
        Turn {
            speaker: "Socrates",
            role: "Moderator",
            history,
            resources,
        }
    }

    #[tokio::test]
    async fn test_request_roles_follow_speaker() {
        let provider = Arc::new(MockLlmProvider::new(vec!["  Then can it be taught?  "]));
        let agent = CompletionAgent::new(provider.clone(), "gpt-4o", "Ask questions.")
            .with_temperature(0.3);

        let history = snapshot();
        let resources = SessionResources::default();
        let reply = agent
            .next_utterance(&turn(&history, &resources))
            .await
            .expect("reply");
        assert_eq!(reply, "Then can it be taught?");

        let requests = provider.requests();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.starts_with("Ask questions."));
        assert_eq!(messages[1].content, "Is virtue teachable?");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[2].name.as_deref(), Some("Socrates"));
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].name.as_deref(), Some("Aristotle"));
        assert_eq!(requests[0].temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let provider = Arc::new(MockLlmProvider::new(vec!["   "]));
        let agent = CompletionAgent::new(provider, "gpt-4o", "x");

        let history = snapshot();
        let resources = SessionResources::default();
        let err = agent
            .next_utterance(&turn(&history, &resources))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentInvocationError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_provider_error_is_propagated() {
        let agent = CompletionAgent::new(Arc::new(MockLlmProvider::failing()), "gpt-4o", "x");

        let history = snapshot();
        let resources = SessionResources::default();
        let err = agent
            .next_utterance(&turn(&history, &resources))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentInvocationError::Llm(LlmError::ApiError { code: 503, .. })
        ));
    }

    struct SlowProvider;

    #[async_trait]
    impl LlmProvider for SlowProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(LlmError::RequestFailed("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let agent = CompletionAgent::new(Arc::new(SlowProvider), "gpt-4o", "x")
            .with_timeout(Duration::from_millis(20));

        let history = snapshot();
        let resources = SessionResources::default();
        let err = agent
            .next_utterance(&turn(&history, &resources))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invocation timed out after 20ms");
        match err {
            AgentInvocationError::Timeout { limit } => {
                assert_eq!(limit, Duration::from_millis(20));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_from_persona_copies_sampling() {
        let persona = PersonaTemplate::builtin_named("Socrates")
            .unwrap()
            .expect("builtin");
        let agent =
            CompletionAgent::from_persona(Arc::new(MockLlmProvider::new(vec![])), "m", &persona);
        assert_eq!(agent.temperature, persona.temperature);
        assert_eq!(agent.max_tokens, persona.max_tokens);
        assert_eq!(agent.kind(), crate::agents::CapabilityKind::Stateless);
    }
}
