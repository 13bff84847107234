//! Participant capabilities.
//!
//! A capability turns the current debate state into one utterance. Two
//! implementations are provided:
//!
//! - [`CompletionAgent`]: stateless; replays the history to a chat completion
//!   model on every turn.
//! - [`RetrievalAgent`]: resource-bound; keeps the session thread in sync and
//!   answers from the document index attached to it.
//!
//! [`personas`] holds the YAML persona templates both are configured from.

pub mod completion;
pub mod personas;
pub mod retrieval;

use async_trait::async_trait;

use crate::debate::{AgentInvocationError, HistorySnapshot};
use crate::resources::SessionResources;

pub use completion::CompletionAgent;
pub use personas::PersonaTemplate;
pub use retrieval::RetrievalAgent;

/// Whether a capability needs session resources to operate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Stateless,
    ResourceBound,
}

/// Everything a capability sees when asked to speak.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    /// Name of the participant being invoked.
    pub speaker: &'a str,
    /// Role description of that participant.
    pub role: &'a str,
    pub history: &'a HistorySnapshot,
    pub resources: &'a SessionResources,
}

/// Produces a participant's next utterance.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Stateless
    }

    async fn next_utterance(&self, turn: &Turn<'_>) -> Result<String, AgentInvocationError>;
}
