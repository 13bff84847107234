//! Speaker selection strategies.
//!
//! A [`SelectionStrategy`] picks the next speaker from the history. It must
//! name a registered participant or fail with a [`SelectionError`]; the
//! orchestrator checks membership again and treats any failure as fatal.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tera::{Context, Tera};

use super::error::{DebateError, SelectionError};
use super::history::HistorySnapshot;
use super::participant::ParticipantRegistry;
use crate::llm::{GenerationRequest, LlmProvider, Message};

/// Decides who speaks next.
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    async fn select(
        &self,
        history: &HistorySnapshot,
        participants: &ParticipantRegistry,
    ) -> Result<String, SelectionError>;
}

/// Fixed rotation keyed off the most recent speaker.
///
/// The first turn always goes to the opening participant; afterwards the
/// table maps each speaker to their successor.
#[derive(Debug, Clone)]
pub struct RotationSelection {
    opening: String,
    successors: HashMap<String, String>,
}

impl RotationSelection {
    pub fn new(opening: impl Into<String>) -> Self {
        Self {
            opening: opening.into(),
            successors: HashMap::new(),
        }
    }

    /// Adds the rule "after `speaker`, `next` speaks".
    pub fn after(mut self, speaker: impl Into<String>, next: impl Into<String>) -> Self {
        self.successors.insert(speaker.into(), next.into());
        self
    }

    /// Cycles through `names` in order, starting with the first.
    pub fn round_robin<I, S>(names: I) -> Result<Self, DebateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let Some(first) = names.first() else {
            return Err(DebateError::Configuration(
                "rotation order cannot be empty".to_string(),
            ));
        };

        let mut rotation = Self::new(first.clone());
        for (i, name) in names.iter().enumerate() {
            let next = &names[(i + 1) % names.len()];
            rotation = rotation.after(name.clone(), next.clone());
        }
        Ok(rotation)
    }

    pub fn opening(&self) -> &str {
        &self.opening
    }
}

#[async_trait]
impl SelectionStrategy for RotationSelection {
    async fn select(
        &self,
        history: &HistorySnapshot,
        participants: &ParticipantRegistry,
    ) -> Result<String, SelectionError> {
        let next = match history.last_speaker() {
            None => &self.opening,
            Some(last) => self.successors.get(last).ok_or_else(|| {
                SelectionError::NoDecision(format!("no rotation rule after '{last}'"))
            })?,
        };

        if !participants.contains(next) {
            return Err(SelectionError::UnknownParticipant(next.clone()));
        }
        Ok(next.clone())
    }
}

/// Default prompt for [`ModelSelection`]. Receives `participants` (names),
/// `opening` (first listed participant), `last_speaker` and `history`.
pub const DEFAULT_SELECTION_TEMPLATE: &str = r#"Your job is to determine which participant takes the next turn in a conversation according to the action of the most recent participant.
State only the name of the participant to take the next turn.

Choose only from these participants:
{% for name in participants %}- {{ name }}
{% endfor %}
Always follow these steps when selecting the next participant:
1) After user input, it is {{ opening }}'s turn to respond.
2) After that, each participant responds in the order listed, building on {{ opening }}'s question.
3) After the last listed participant replies, it is {{ opening }}'s turn to summarize the responses.

Make sure each participant has a turn.{% if last_speaker %} The most recent participant was {{ last_speaker }}.{% endif %}

History:
{{ history }}"#;

/// Asks a completion model who should speak next.
///
/// The answer is accepted only if it names exactly one registered
/// participant: an exact (case-insensitive) match of the whole reply wins,
/// otherwise the reply must mention a single participant by name.
pub struct ModelSelection {
    provider: Arc<dyn LlmProvider>,
    model: String,
    template: String,
}

impl ModelSelection {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            template: DEFAULT_SELECTION_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    fn render(
        &self,
        history: &HistorySnapshot,
        participants: &ParticipantRegistry,
    ) -> Result<String, SelectionError> {
        let names = participants.names();
        let mut context = Context::new();
        context.insert("participants", &names);
        context.insert("opening", names.first().copied().unwrap_or_default());
        context.insert("last_speaker", &history.last_speaker());
        context.insert("history", &history.transcript());

        Tera::one_off(&self.template, &context, false)
            .map_err(|e| SelectionError::Model(format!("selection prompt: {e}")))
    }
}

#[async_trait]
impl SelectionStrategy for ModelSelection {
    async fn select(
        &self,
        history: &HistorySnapshot,
        participants: &ParticipantRegistry,
    ) -> Result<String, SelectionError> {
        let prompt = self.render(history, participants)?;
        let request = GenerationRequest::new(self.model.clone(), vec![Message::user(prompt)])
            .with_temperature(0.0);

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|e| SelectionError::Model(e.to_string()))?;
        let answer = response.first_content().unwrap_or_default();

        let choice = parse_participant(answer, participants)?;
        tracing::debug!(answer = %answer.trim(), choice = %choice, "Model selected next speaker");
        Ok(choice)
    }
}

/// Reduces a free-text answer to exactly one registered participant name.
pub fn parse_participant(
    answer: &str,
    participants: &ParticipantRegistry,
) -> Result<String, SelectionError> {
    let cleaned = answer
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());

    if let Some(name) = participants
        .names()
        .into_iter()
        .find(|n| n.eq_ignore_ascii_case(cleaned))
    {
        return Ok(name.to_string());
    }

    let mentioned: Vec<&str> = participants
        .names()
        .into_iter()
        .filter(|name| mentions(answer, name))
        .collect();

    match mentioned.as_slice() {
        [one] => Ok(one.to_string()),
        [] => Err(SelectionError::NoDecision(format!(
            "answer '{}' names no participant",
            answer.trim()
        ))),
        many => Err(SelectionError::NoDecision(format!(
            "answer '{}' names {} participants",
            answer.trim(),
            many.len()
        ))),
    }
}

fn mentions(text: &str, name: &str) -> bool {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}
