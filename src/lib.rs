//! symposium: a multi-party debate orchestrator for LLM-backed personas.
//!
//! Participants take turns answering an opening prompt. A selection strategy
//! picks each speaker, a termination strategy decides when the debate is
//! over, and any external resources the participants need (an ingested
//! document, its index, a conversation thread) are scoped to the session and
//! released on every exit path.

pub mod agents;
pub mod cli;
pub mod config;
pub mod debate;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod resources;

pub use error::{BackendError, ConfigError, LlmError};
