//! Integration tests against a live OpenAI-compatible endpoint.
//!
//! These tests make real API calls.
//! Run with: SYMPOSIUM_MODEL=gpt-4o SYMPOSIUM_API_KEY=your_key cargo test --test llm_integration -- --ignored

use std::sync::Arc;

use futures::StreamExt;
use symposium::agents::{CompletionAgent, PersonaTemplate};
use symposium::config::{DebateConfig, ServiceConfig};
use symposium::debate::{
    DebateEvent, DebateOrchestrator, ModelSelection, ModelTermination, Participant,
};
use symposium::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};

fn create_test_client() -> (ServiceConfig, Arc<dyn LlmProvider>) {
    let config = ServiceConfig::from_env()
        .expect("SYMPOSIUM_MODEL and an API key must be set for integration tests");
    let client = LiteLlmClient::from_config(&config);
    (config, Arc::new(client))
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let (config, client) = create_test_client();

    let request = GenerationRequest::new(
        config.model,
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(
        content.contains('4'),
        "Response should contain '4', got: {}",
        content
    );
    assert!(response.usage.total_tokens > 0, "Should have token usage");
}

#[tokio::test]
#[ignore]
async fn test_named_speakers_are_kept_apart() {
    let (config, client) = create_test_client();

    let request = GenerationRequest::new(
        config.model,
        vec![
            Message::system("You moderate a debate. Be concise."),
            Message::user("Justice is the interest of the stronger.").with_name("Thrasymachus"),
            Message::user("Justice is each doing their own work.").with_name("Plato"),
            Message::user("Who claimed justice serves the stronger? Reply with the name only."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client
        .generate(request)
        .await
        .expect("Generation should succeed");
    let content = response.first_content().expect("Should have content");
    assert!(
        content.contains("Thrasymachus"),
        "Response should name Thrasymachus, got: {}",
        content
    );
}

#[tokio::test]
#[ignore]
async fn test_model_driven_debate() {
    let (config, client) = create_test_client();

    let participants: Vec<Participant> = PersonaTemplate::builtin()
        .expect("built-in personas")
        .into_iter()
        .filter(|p| !p.retrieval)
        .map(|p| {
            let agent = CompletionAgent::from_persona(client.clone(), config.model.clone(), &p);
            Participant::new(p.name, p.role, Arc::new(agent))
        })
        .collect();

    let mut stream = DebateOrchestrator::builder()
        .participants(participants)
        .selection(ModelSelection::new(client.clone(), config.model.clone()))
        .termination(ModelTermination::new(client.clone(), config.model.clone()))
        .config(
            DebateConfig::default()
                .with_max_iterations(3)
                .with_terminator("Socrates"),
        )
        .build()
        .expect("valid debate")
        .run("Is the unexamined life worth living?");

    let mut turns = 0;
    while let Some(event) = stream.next().await {
        match event {
            DebateEvent::Utterance(u) => {
                assert!(!u.content.is_empty());
                turns += 1;
            }
            DebateEvent::Ended(outcome) => {
                assert!(outcome.is_completed(), "debate failed: {:?}", outcome.error());
            }
        }
    }
    assert!((1..=3).contains(&turns));
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let client = LiteLlmClient::new(
        "http://127.0.0.1:9".to_string(),
        Some("invalid-key".to_string()),
        "gpt-4o".to_string(),
    );

    let request = GenerationRequest::new("gpt-4o", vec![Message::user("test")]).with_max_tokens(5);

    let response = client.generate(request).await;
    assert!(response.is_err(), "Should fail against a closed port");
}
