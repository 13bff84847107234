//! Named participants and the registry that validates them.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::agents::{AgentCapability, CapabilityKind};

use super::error::DebateError;

/// A named agent taking part in a debate.
#[derive(Clone)]
pub struct Participant {
    name: String,
    role: String,
    capability: Arc<dyn AgentCapability>,
}

impl Participant {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        capability: Arc<dyn AgentCapability>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            capability,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn capability(&self) -> &Arc<dyn AgentCapability> {
        &self.capability
    }

    pub fn requires_resources(&self) -> bool {
        self.capability.kind() == CapabilityKind::ResourceBound
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("kind", &self.capability.kind())
            .finish()
    }
}

/// The fixed, validated set of participants for one session.
///
/// Names are unique and non-empty, and a debate needs at least two voices.
#[derive(Debug, Clone)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    /// Minimum number of participants in a debate.
    pub const MIN_PARTICIPANTS: usize = 2;

    pub fn new(participants: Vec<Participant>) -> Result<Self, DebateError> {
        if participants.len() < Self::MIN_PARTICIPANTS {
            return Err(DebateError::Configuration(format!(
                "a debate needs at least {} participants, got {}",
                Self::MIN_PARTICIPANTS,
                participants.len()
            )));
        }

        let mut seen = HashSet::new();
        for participant in &participants {
            if participant.name.trim().is_empty() {
                return Err(DebateError::Configuration(
                    "participant names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(participant.name.as_str()) {
                return Err(DebateError::Configuration(format!(
                    "duplicate participant name '{}'",
                    participant.name
                )));
            }
        }

        Ok(Self { participants })
    }

    pub fn get(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Participant names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether any participant needs session resources provisioned.
    pub fn requires_resources(&self) -> bool {
        self.participants.iter().any(Participant::requires_resources)
    }
}
