use dotenvy::dotenv;
use openrouter_gateway::{ChatInput, OpenRouterClient, OpenRouterConfig};

fn build_client_from_env() -> Option<OpenRouterClient> {
    let config = OpenRouterConfig::from_env();
    if config.api_key.is_empty() || config.default_model.is_empty() {
        eprintln!("skip live test: OPENROUTER_API_KEY or OPENROUTER_DEFAULT_MODEL missing");
        return None;
    }
    Some(OpenRouterClient::from_config(config).expect("client builds from env"))
}

#[tokio::test]
#[ignore = "requires a valid OpenRouter API key"]
async fn chat_completion_live() {
    dotenv().ok();
    let Some(client) = build_client_from_env() else {
        return;
    };

    let result = client
        .create_chat_completion(ChatInput {
            system: Some("Answer in one short sentence.".to_string()),
            ..ChatInput::user("What is a flashcard?")
        })
        .await
        .expect("live chat completion should succeed");

    assert!(!result.content.trim().is_empty());
    assert!(!result.model.is_empty());
}

#[tokio::test]
#[ignore = "requires a valid OpenRouter API key"]
async fn health_check_live() {
    dotenv().ok();
    let Some(client) = build_client_from_env() else {
        return;
    };

    let status = client.health_check().await;
    assert!(status.ok, "gateway should be reachable: {status:?}");
}
