//! OpenAI Assistants-compatible resource backend.
//!
//! Implements every resource trait against the `/files`, `/vector_stores`,
//! `/assistants` and `/threads` endpoints:
//!
//! | Step     | Create                          | Release                   |
//! |----------|---------------------------------|---------------------------|
//! | document | `POST /files` (multipart)       | `DELETE /files/{id}`      |
//! | index    | `POST /vector_stores`           | `DELETE /vector_stores/{id}` |
//! | thread   | `POST /assistants` + `/threads` | `DELETE` both             |
//!
//! The assistant is created together with its thread, bound to the vector
//! store, and the returned [`ThreadId`] carries both ids as
//! `"{assistant_id}/{thread_id}"` so that closing the thread can release the
//! assistant too.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{
    ConversationService, DocumentId, DocumentStore, IndexId, IndexService, SourceDocument,
    ThreadId, ThreadService,
};
use crate::error::BackendError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for [`AssistantsClient`].
#[derive(Debug, Clone)]
pub struct AssistantsConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    /// Model the session assistant runs on.
    pub model: String,
    /// Display name of the session assistant.
    pub assistant_name: String,
    /// System instructions of the session assistant.
    pub instructions: String,
    pub poll_interval: Duration,
    /// Upper bound on waiting for a run or an index to finish.
    pub run_timeout: Duration,
    pub request_timeout: Duration,
}

impl AssistantsConfig {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            assistant_name: "symposium".to_string(),
            instructions: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_assistant(
        mut self,
        name: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        self.assistant_name = name.into();
        self.instructions = instructions.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP client for an Assistants-style API.
pub struct AssistantsClient {
    config: AssistantsConfig,
    api_base: String,
    http_client: Client,
}

impl AssistantsClient {
    pub fn new(config: AssistantsConfig) -> Self {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Falling back to default HTTP client configuration");
                Client::new()
            });
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &AssistantsConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("OpenAI-Beta", "assistants=v2");
        match self.config.api_key {
            Some(ref key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| BackendError::ParseError(e.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let _: DeletedObject = self.send(self.http_client.delete(self.url(path))).await?;
        Ok(())
    }

    async fn wait_for_index(&self, index_id: &str) -> Result<(), BackendError> {
        let deadline = Instant::now() + self.config.run_timeout;
        loop {
            let store: VectorStoreObject = self
                .send(
                    self.http_client
                        .get(self.url(&format!("vector_stores/{index_id}"))),
                )
                .await?;

            match store.status.as_str() {
                "completed" => return Ok(()),
                "in_progress" => {}
                other => {
                    return Err(BackendError::RunFailed {
                        run_id: index_id.to_string(),
                        status: other.to_string(),
                    })
                }
            }

            if Instant::now() >= deadline {
                return Err(BackendError::Timeout {
                    operation: format!("index {index_id}"),
                    limit: self.config.run_timeout,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<(), BackendError> {
        let deadline = Instant::now() + self.config.run_timeout;
        loop {
            let run: RunObject = self
                .send(
                    self.http_client
                        .get(self.url(&format!("threads/{thread_id}/runs/{run_id}"))),
                )
                .await?;

            match run.status.as_str() {
                "completed" => return Ok(()),
                "queued" | "in_progress" | "cancelling" => {}
                other => {
                    if let Some(ref error) = run.last_error {
                        warn!(run_id, code = %error.code, message = %error.message, "Run failed");
                    }
                    return Err(BackendError::RunFailed {
                        run_id: run_id.to_string(),
                        status: other.to_string(),
                    });
                }
            }

            if Instant::now() >= deadline {
                return Err(BackendError::Timeout {
                    operation: format!("run {run_id}"),
                    limit: self.config.run_timeout,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl DocumentStore for AssistantsClient {
    async fn ingest(&self, document: &SourceDocument) -> Result<DocumentId, BackendError> {
        let part = Part::bytes(document.bytes.clone()).file_name(document.name.clone());
        let form = Form::new().text("purpose", "assistants").part("file", part);

        let file: CreatedObject = self
            .send(self.http_client.post(self.url("files")).multipart(form))
            .await?;
        debug!(file_id = %file.id, name = %document.name, "Uploaded document");
        Ok(DocumentId(file.id))
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<(), BackendError> {
        self.delete(&format!("files/{id}")).await
    }
}

#[async_trait]
impl IndexService for AssistantsClient {
    async fn build_index(&self, document: &DocumentId) -> Result<IndexId, BackendError> {
        let body = json!({
            "name": format!("{}-index", self.config.assistant_name),
            "file_ids": [document.as_str()],
            "metadata": { "symposium": "true" },
        });
        let store: CreatedObject = self
            .send(self.http_client.post(self.url("vector_stores")).json(&body))
            .await?;

        // Not yet tracked by the scope, so an unfinished store is deleted here.
        if let Err(err) = self.wait_for_index(&store.id).await {
            if let Err(cleanup) = self.delete(&format!("vector_stores/{}", store.id)).await {
                warn!(index_id = %store.id, error = %cleanup, "Failed to delete unfinished index");
            }
            return Err(err);
        }

        debug!(index_id = %store.id, "Index ready");
        Ok(IndexId(store.id))
    }

    async fn delete_index(&self, id: &IndexId) -> Result<(), BackendError> {
        self.delete(&format!("vector_stores/{id}")).await
    }
}

#[async_trait]
impl ThreadService for AssistantsClient {
    async fn open_thread(&self, index: &IndexId) -> Result<ThreadId, BackendError> {
        let body = json!({
            "model": self.config.model,
            "name": self.config.assistant_name,
            "instructions": self.config.instructions,
            "tools": [{ "type": "file_search" }],
            "tool_resources": { "file_search": { "vector_store_ids": [index.as_str()] } },
        });
        let assistant: CreatedObject = self
            .send(self.http_client.post(self.url("assistants")).json(&body))
            .await?;

        let thread: Result<CreatedObject, _> = self
            .send(self.http_client.post(self.url("threads")).json(&json!({})))
            .await;

        match thread {
            Ok(thread) => {
                debug!(assistant_id = %assistant.id, thread_id = %thread.id, "Thread opened");
                Ok(ThreadId(format!("{}/{}", assistant.id, thread.id)))
            }
            Err(err) => {
                if let Err(cleanup) = self.delete(&format!("assistants/{}", assistant.id)).await {
                    warn!(assistant_id = %assistant.id, error = %cleanup, "Failed to delete assistant");
                }
                Err(err)
            }
        }
    }

    async fn close_thread(&self, id: &ThreadId) -> Result<(), BackendError> {
        let (assistant_id, thread_id) = split_thread_id(id)?;
        let thread_result = self.delete(&format!("threads/{thread_id}")).await;
        let assistant_result = self.delete(&format!("assistants/{assistant_id}")).await;
        thread_result.and(assistant_result)
    }
}

#[async_trait]
impl ConversationService for AssistantsClient {
    async fn post_message(
        &self,
        thread: &ThreadId,
        author: &str,
        content: &str,
    ) -> Result<(), BackendError> {
        let (_, thread_id) = split_thread_id(thread)?;
        let body = json!({
            "role": "user",
            "content": format!("[{author}]: {content}"),
        });
        let _: CreatedObject = self
            .send(
                self.http_client
                    .post(self.url(&format!("threads/{thread_id}/messages")))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn run(&self, thread: &ThreadId) -> Result<String, BackendError> {
        let (assistant_id, thread_id) = split_thread_id(thread)?;
        let run: CreatedObject = self
            .send(
                self.http_client
                    .post(self.url(&format!("threads/{thread_id}/runs")))
                    .json(&json!({ "assistant_id": assistant_id })),
            )
            .await?;

        self.wait_for_run(thread_id, &run.id).await?;

        let messages: MessageList = self
            .send(
                self.http_client
                    .get(self.url(&format!("threads/{thread_id}/messages?order=desc&limit=1"))),
            )
            .await?;

        messages
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .map(|m| m.text())
            .ok_or_else(|| BackendError::ParseError("run produced no assistant message".to_string()))
    }
}

fn split_thread_id(id: &ThreadId) -> Result<(&str, &str), BackendError> {
    id.as_str()
        .split_once('/')
        .filter(|(a, t)| !a.is_empty() && !t.is_empty())
        .ok_or_else(|| BackendError::ParseError(format!("malformed thread id '{id}'")))
}

fn api_error(code: u16, body: &str) -> BackendError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.to_string());
    if code == 404 {
        BackendError::NotFound(message)
    } else {
        BackendError::ApiError { code, message }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DeletedObject {
    #[serde(default)]
    #[allow(dead_code)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct VectorStoreObject {
    status: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

impl ThreadMessage {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| part.text.as_ref().map(|t| t.value.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AssistantsClient {
        AssistantsClient::new(
            AssistantsConfig::new(server.uri(), Some("sk-test".to_string()), "gpt-4o")
                .with_poll_interval(Duration::from_millis(10))
                .with_run_timeout(Duration::from_secs(2)),
        )
    }

    fn created(id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "id": id }))
    }

    fn deleted(id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "id": id, "deleted": true }))
    }

    #[test]
    fn test_split_thread_id() {
        let id = ThreadId("asst_1/thread_9".to_string());
        assert_eq!(split_thread_id(&id).unwrap(), ("asst_1", "thread_9"));

        assert!(split_thread_id(&ThreadId("thread_9".to_string())).is_err());
        assert!(split_thread_id(&ThreadId("/thread_9".to_string())).is_err());
    }

    #[test]
    fn test_api_error_mapping() {
        let body = r#"{"error": {"message": "No such file", "type": "invalid_request_error"}}"#;
        match api_error(404, body) {
            BackendError::NotFound(msg) => assert_eq!(msg, "No such file"),
            other => panic!("unexpected: {other:?}"),
        }

        match api_error(500, "upstream exploded") {
            BackendError::ApiError { code, message } => {
                assert_eq!(code, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_message_text_joins_text_parts() {
        let json = r#"{
            "data": [{
                "role": "assistant",
                "content": [
                    {"type": "text", "text": {"value": "The Forms", "annotations": []}},
                    {"type": "image_file", "image_file": {"file_id": "f"}},
                    {"type": "text", "text": {"value": "are eternal.", "annotations": []}}
                ]
            }]
        }"#;
        let list: MessageList = serde_json::from_str(json).unwrap();
        assert_eq!(list.data[0].text(), "The Forms\nare eternal.");
    }

    #[test]
    fn test_config_builder() {
        let config = AssistantsConfig::new("https://api.openai.com/v1/", None, "gpt-4o")
            .with_assistant("Plato", "Answer from the Republic.")
            .with_poll_interval(Duration::from_millis(10));
        assert_eq!(config.assistant_name, "Plato");
        assert_eq!(config.poll_interval, Duration::from_millis(10));

        let client = AssistantsClient::new(config);
        assert_eq!(client.url("files"), "https://api.openai.com/v1/files");
    }

    #[tokio::test]
    async fn test_ingest_connection_error() {
        let client = AssistantsClient::new(
            AssistantsConfig::new("http://localhost:65535", None, "gpt-4o")
                .with_request_timeout(Duration::from_secs(2)),
        );
        let result = client
            .ingest(&SourceDocument::new("a.txt", b"a".to_vec()))
            .await;
        assert!(matches!(result, Err(BackendError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn test_open_thread_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistants"))
            .respond_with(created("asst_1"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(created("thread_9"))
            .expect(1)
            .mount(&server)
            .await;

        let thread = client_for(&server)
            .open_thread(&IndexId("vs_1".to_string()))
            .await
            .unwrap();
        assert_eq!(thread.as_str(), "asst_1/thread_9");
        server.verify().await;
    }

    #[tokio::test]
    async fn test_failed_thread_deletes_assistant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistants"))
            .respond_with(created("asst_1"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "error": { "message": "thread store down" } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/assistants/asst_1"))
            .respond_with(deleted("asst_1"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .open_thread(&IndexId("vs_1".to_string()))
            .await;
        match result {
            Err(BackendError::ApiError { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "thread store down");
            }
            other => panic!("unexpected: {other:?}"),
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn test_failed_index_is_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vector_stores"))
            .respond_with(created("vs_1"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vector_stores/vs_1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "vs_1", "status": "failed" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/vector_stores/vs_1"))
            .respond_with(deleted("vs_1"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .build_index(&DocumentId("file_1".to_string()))
            .await;
        match result {
            Err(BackendError::RunFailed { run_id, status }) => {
                assert_eq!(run_id, "vs_1");
                assert_eq!(status, "failed");
            }
            other => panic!("unexpected: {other:?}"),
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn test_close_thread_deletes_assistant_when_thread_delete_fails() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/threads/thread_9"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({ "error": { "message": "No thread found" } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/assistants/asst_1"))
            .respond_with(deleted("asst_1"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .close_thread(&ThreadId("asst_1/thread_9".to_string()))
            .await;
        match result {
            Err(BackendError::NotFound(message)) => assert_eq!(message, "No thread found"),
            other => panic!("unexpected: {other:?}"),
        }
        server.verify().await;
    }
}
