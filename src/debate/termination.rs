//! Termination strategies.
//!
//! A [`TerminationStrategy`] answers whether the debate should stop. The
//! orchestrator asks it only after utterances from the configured terminating
//! participants, and enforces the iteration cap regardless of its answers.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tera::{Context, Tera};

use super::error::TerminationPolicyError;
use super::history::HistorySnapshot;
use crate::llm::{GenerationRequest, LlmProvider, Message};

/// Decides whether the debate is over.
#[async_trait]
pub trait TerminationStrategy: Send + Sync {
    async fn should_stop(&self, history: &HistorySnapshot) -> Result<bool, TerminationPolicyError>;
}

/// Never stops; only the iteration cap ends the debate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

#[async_trait]
impl TerminationStrategy for NeverStop {
    async fn should_stop(&self, _history: &HistorySnapshot) -> Result<bool, TerminationPolicyError> {
        Ok(false)
    }
}

/// Stops once every named participant has spoken at least once.
#[derive(Debug, Clone)]
pub struct AllParticipantsSpoke {
    names: Vec<String>,
}

impl AllParticipantsSpoke {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl TerminationStrategy for AllParticipantsSpoke {
    async fn should_stop(&self, history: &HistorySnapshot) -> Result<bool, TerminationPolicyError> {
        let spoken: HashSet<&str> = history
            .utterances()
            .iter()
            .map(|u| u.author.as_str())
            .collect();
        Ok(self.names.iter().all(|n| spoken.contains(n.as_str())))
    }
}

/// Reduces a model's free-text judgment to a boolean.
pub type ResultParser = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// True when the answer contains "yes" as a whole word, in any case.
pub fn affirmative_marker(answer: &str) -> bool {
    static YES: OnceLock<Option<Regex>> = OnceLock::new();
    YES.get_or_init(|| Regex::new(r"(?i)\byes\b").ok())
        .as_ref()
        .map(|re| re.is_match(answer))
        .unwrap_or(false)
}

/// Default prompt for [`ModelTermination`]. Receives `history` and `turns`.
pub const DEFAULT_TERMINATION_TEMPLATE: &str = r#"Make sure every participant gets a chance to speak.

Determine whether the conversation below is complete: every participant has spoken and the most recent reply summarizes the discussion.
Answer only "yes" if it is complete, otherwise answer "no".

History ({{ turns }} turns):

{{ history }}"#;

/// Asks a completion model whether the debate is complete.
pub struct ModelTermination {
    provider: Arc<dyn LlmProvider>,
    model: String,
    template: String,
    parser: ResultParser,
}

impl ModelTermination {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            template: DEFAULT_TERMINATION_TEMPLATE.to_string(),
            parser: Arc::new(affirmative_marker),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.parser = Arc::new(parser);
        self
    }
}

impl fmt::Debug for ModelTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelTermination")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TerminationStrategy for ModelTermination {
    async fn should_stop(&self, history: &HistorySnapshot) -> Result<bool, TerminationPolicyError> {
        let mut context = Context::new();
        context.insert("history", &history.transcript());
        context.insert("turns", &history.len());
        let prompt = Tera::one_off(&self.template, &context, false)
            .map_err(|e| TerminationPolicyError::Template(e.to_string()))?;

        let request = GenerationRequest::new(self.model.clone(), vec![Message::user(prompt)])
            .with_temperature(0.0);
        let response = self.provider.generate(request).await?;
        let answer = response.first_content().unwrap_or_default();

        let stop = (self.parser)(answer);
        tracing::debug!(answer = %answer.trim(), stop, "Termination judgment");
        Ok(stop)
    }
}
