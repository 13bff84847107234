//! Resource-bound participant that answers from a document index.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::completion::DEFAULT_INVOCATION_TIMEOUT;
use super::{AgentCapability, CapabilityKind, Turn};
use crate::debate::AgentInvocationError;
use crate::resources::{ConversationService, ThreadId};

/// Author name used when forwarding the opening prompt.
const PROMPT_AUTHOR: &str = "User";

/// Holds its conversation on a persistent thread.
///
/// Before each run the agent forwards the opening prompt (once) and every
/// utterance added since its last turn, skipping its own, so the thread mirrors
/// the shared history. A new thread id resets the cursor.
pub struct RetrievalAgent {
    conversation: Arc<dyn ConversationService>,
    timeout: Duration,
    cursor: Mutex<SyncCursor>,
}

#[derive(Debug, Default)]
struct SyncCursor {
    thread: Option<ThreadId>,
    prompt_posted: bool,
    synced: usize,
}

impl RetrievalAgent {
    pub fn new(conversation: Arc<dyn ConversationService>) -> Self {
        Self {
            conversation,
            timeout: DEFAULT_INVOCATION_TIMEOUT,
            cursor: Mutex::new(SyncCursor::default()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn sync_and_run(
        &self,
        thread: &ThreadId,
        turn: &Turn<'_>,
    ) -> Result<String, AgentInvocationError> {
        let mut cursor = self.cursor.lock().await;
        if cursor.thread.as_ref() != Some(thread) {
            *cursor = SyncCursor {
                thread: Some(thread.clone()),
                ..Default::default()
            };
        }

        if !cursor.prompt_posted {
            self.conversation
                .post_message(thread, PROMPT_AUTHOR, turn.history.opening_prompt())
                .await?;
            cursor.prompt_posted = true;
        }

        let pending = turn.history.utterances().get(cursor.synced..).unwrap_or(&[]);
        for utterance in pending {
            if utterance.author != turn.speaker {
                self.conversation
                    .post_message(thread, &utterance.author, &utterance.content)
                    .await?;
            }
            cursor.synced += 1;
        }

        tracing::debug!(
            speaker = turn.speaker,
            thread = %thread,
            synced = cursor.synced,
            "Thread synchronized, running assistant"
        );

        let reply = self.conversation.run(thread).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(AgentInvocationError::EmptyResponse);
        }
        Ok(reply.to_string())
    }
}

#[async_trait]
impl AgentCapability for RetrievalAgent {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::ResourceBound
    }

    async fn next_utterance(&self, turn: &Turn<'_>) -> Result<String, AgentInvocationError> {
        let thread = turn
            .resources
            .thread
            .as_ref()
            .ok_or(AgentInvocationError::MissingResource("thread"))?;

        tokio::time::timeout(self.timeout, self.sync_and_run(thread, turn))
            .await
            .map_err(|_| AgentInvocationError::Timeout {
                limit: self.timeout,
            })?
    }
}
