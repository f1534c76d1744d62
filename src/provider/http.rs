//! Shared HTTP plumbing for the provider adapters.

use super::error::{classify_status, classify_transport};
use super::{Provider, ProviderError};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

/// Create the HTTP client used by the adapters.
///
/// No request timeout is set; callers impose request-level deadlines.
pub fn create_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("notebook/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Join a configured base URL and an endpoint path.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Send a request and decode a JSON body, classifying any failure.
pub async fn send_json<T: DeserializeOwned>(
    provider: Provider,
    request: RequestBuilder,
    model: Option<&str>,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(provider, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(provider, status, &body, model));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::unknown(provider, format!("Failed to parse response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("http://localhost:11434/", "/api/tags"),
            "http://localhost:11434/api/tags"
        );
        assert_eq!(
            endpoint("https://api.anthropic.com", "v1/messages"),
            "https://api.anthropic.com/v1/messages"
        );
    }
}
