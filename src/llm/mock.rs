//! Scripted provider shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use crate::error::LlmError;

/// Replays canned replies in order, repeating the last one, and records
/// every request it receives.
pub(crate) struct MockLlmProvider {
    responses: Vec<String>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
    fail: bool,
}

impl MockLlmProvider {
    pub(crate) fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: responses.into_iter().map(String::from).collect(),
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("lock not poisoned").clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("lock not poisoned")
            .push(request);

        if self.fail {
            return Err(LlmError::ApiError {
                code: 503,
                message: "service unavailable".to_string(),
            });
        }

        let content = self
            .responses
            .get(idx)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();

        Ok(GenerationResponse {
            id: format!("mock-{}", idx),
            model: "mock-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}
