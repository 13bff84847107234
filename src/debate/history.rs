//! Append-only utterance log and its immutable snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::HistoryError;

/// One participant's contribution at a point in the debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// Zero-based position in the history.
    pub sequence: usize,
    /// Name of the participant who spoke.
    pub author: String,
    /// What was said.
    pub content: String,
    /// When the utterance was committed.
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    /// Creates a new utterance stamped with the current time.
    pub fn new(sequence: usize, author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sequence,
            author: author.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only record of a session's utterances.
///
/// The opening prompt is kept beside the log rather than in it, so the first
/// utterance has sequence number 0 and the length always equals the number
/// of completed turns.
#[derive(Debug, Clone)]
pub struct History {
    opening_prompt: Arc<str>,
    utterances: Vec<Utterance>,
}

impl History {
    /// Creates an empty history seeded with the opening prompt.
    pub fn new(opening_prompt: impl Into<String>) -> Self {
        let opening_prompt: String = opening_prompt.into();
        Self {
            opening_prompt: Arc::from(opening_prompt),
            utterances: Vec::new(),
        }
    }

    /// Appends an utterance. Its sequence number must equal the current length.
    pub fn append(&mut self, utterance: Utterance) -> Result<(), HistoryError> {
        let expected = self.utterances.len();
        if utterance.sequence != expected {
            return Err(HistoryError::OutOfSequence {
                expected,
                actual: utterance.sequence,
            });
        }
        self.utterances.push(utterance);
        Ok(())
    }

    /// Sequence number the next appended utterance must carry.
    pub fn next_sequence(&self) -> usize {
        self.utterances.len()
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    pub fn opening_prompt(&self) -> &str {
        &self.opening_prompt
    }

    pub fn last(&self) -> Option<&Utterance> {
        self.utterances.last()
    }

    /// Takes a read-only copy; later appends are not visible through it.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            opening_prompt: Arc::clone(&self.opening_prompt),
            utterances: Arc::from(self.utterances.as_slice()),
        }
    }
}

/// Immutable view of a [`History`] at a point in time. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    opening_prompt: Arc<str>,
    utterances: Arc<[Utterance]>,
}

impl HistorySnapshot {
    /// Builds a snapshot directly, mostly useful for exercising strategies.
    pub fn from_parts(opening_prompt: impl Into<String>, utterances: Vec<Utterance>) -> Self {
        let opening_prompt: String = opening_prompt.into();
        Self {
            opening_prompt: Arc::from(opening_prompt),
            utterances: Arc::from(utterances),
        }
    }

    pub fn opening_prompt(&self) -> &str {
        &self.opening_prompt
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    pub fn last(&self) -> Option<&Utterance> {
        self.utterances.last()
    }

    /// Name of the most recent speaker, `None` before the first turn.
    pub fn last_speaker(&self) -> Option<&str> {
        self.last().map(|u| u.author.as_str())
    }

    /// Number of utterances by `author`.
    pub fn count_by(&self, author: &str) -> usize {
        self.utterances.iter().filter(|u| u.author == author).count()
    }

    /// Renders the prompt and every utterance as `Name: text` lines.
    pub fn transcript(&self) -> String {
        let mut out = format!("User: {}", self.opening_prompt);
        for utterance in self.utterances.iter() {
            out.push('\n');
            out.push_str(&utterance.author);
            out.push_str(": ");
            out.push_str(&utterance.content);
        }
        out
    }
}
