//! Fake provider servers shared by the integration tests.

#![allow(dead_code)]

use axum::Router;
use notebook::credentials::{CredentialStore, StaticCredentials};
use notebook::provider::{
    AnthropicAdapter, GeminiAdapter, OllamaAdapter, OpenAIAdapter, Provider, ProviderAdapter,
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Credentials with a key for every cloud provider.
pub fn all_keys() -> Arc<dyn CredentialStore> {
    Arc::new(
        StaticCredentials::new()
            .with_key(Provider::OpenAI, "sk-test")
            .with_key(Provider::Anthropic, "sk-ant-test")
            .with_key(Provider::Google, "AIza-test"),
    )
}

/// Base URLs for the four adapters.
pub struct Urls {
    pub ollama: String,
    pub openai: String,
    pub anthropic: String,
    pub google: String,
}

impl Urls {
    pub async fn all_dead() -> Self {
        Self {
            ollama: dead_url().await,
            openai: dead_url().await,
            anthropic: dead_url().await,
            google: dead_url().await,
        }
    }
}

/// The four adapters in display order.
pub fn adapters(urls: &Urls, credentials: Arc<dyn CredentialStore>) -> Vec<Arc<dyn ProviderAdapter>> {
    let client = reqwest::Client::new();
    let openai_base = format!("{}/v1", urls.openai);
    vec![
        Arc::new(OllamaAdapter::new(client.clone(), &urls.ollama, "mistral")),
        Arc::new(OpenAIAdapter::new(
            client.clone(),
            credentials.clone(),
            Some(openai_base.as_str()),
            "gpt-4o-mini",
        )),
        Arc::new(AnthropicAdapter::new(
            client.clone(),
            credentials.clone(),
            &urls.anthropic,
            "claude-3-5-haiku-20241022",
            4096,
        )),
        Arc::new(GeminiAdapter::new(client, credentials, &urls.google)),
    ]
}
