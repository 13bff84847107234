//! LLM integration for symposium.
//!
//! Stateless debate participants and the model-driven selection and
//! termination strategies talk to a chat completion service through the
//! [`LlmProvider`] trait. [`LiteLlmClient`] is the HTTP implementation for
//! LiteLLM / OpenAI-compatible endpoints.
//!
//! ```ignore
//! use symposium::config::ServiceConfig;
//! use symposium::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_config(&ServiceConfig::from_env()?);
//! let request = GenerationRequest::new("gpt-4o", vec![Message::user("Hello")]);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
};

#[cfg(test)]
pub(crate) mod mock;
