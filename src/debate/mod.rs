//! Turn scheduling, termination and session lifecycle for a multi-party debate.
//!
//! # Architecture
//!
//! ```text
//! DebateOrchestrator::run(prompt) -> DebateStream
//!     |
//!     |-- ResourceScope::provision (only if a participant is resource-bound)
//!     |
//!     |-- loop
//!     |     SelectionStrategy::select(snapshot, registry)   -> speaker
//!     |     AgentCapability::next_utterance(turn)           -> text
//!     |     History::append(utterance)
//!     |     TerminationStrategy::should_stop(snapshot)      (terminators only)
//!     |     iteration cap
//!     |
//!     '-- ResourceScope::release_all (exactly once, every exit path)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use symposium::debate::{DebateEvent, DebateOrchestrator, RotationSelection};
//!
//! let mut stream = DebateOrchestrator::builder()
//!     .participants(participants)
//!     .selection(RotationSelection::round_robin(["Socrates", "Plato", "Aristotle"])?)
//!     .build()?
//!     .run("How can we ensure that AI benefits all of humanity?");
//!
//! while let Some(event) = stream.next().await {
//!     if let DebateEvent::Utterance(u) = event {
//!         println!("[{}]: '{}'", u.author, u.content);
//!     }
//! }
//! ```

pub mod error;
pub mod history;
pub mod orchestrator;
pub mod participant;
pub mod selection;
pub mod stream;
pub mod termination;

pub use error::{
    AgentInvocationError, DebateError, DebateResult, HistoryError, SelectionError,
    TerminationPolicyError,
};
pub use history::{History, HistorySnapshot, Utterance};
pub use orchestrator::{DebateOrchestrator, DebateOrchestratorBuilder};
pub use participant::{Participant, ParticipantRegistry};
pub use selection::{parse_participant, ModelSelection, RotationSelection, SelectionStrategy};
pub use stream::{
    DebateEvent, DebateOutcome, DebateStream, DebateTranscript, SessionStatus, StopReason,
};
pub use termination::{
    affirmative_marker, AllParticipantsSpoke, ModelTermination, NeverStop, ResultParser,
    TerminationStrategy,
};
