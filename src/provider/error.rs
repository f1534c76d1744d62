//! Provider error taxonomy and the shared classification helpers.
//!
//! Every adapter funnels its failures through [`classify_status`],
//! [`classify_transport`] or [`classify_message`], so the four backends
//! agree on what an auth failure or an unreachable service looks like.

use super::Provider;
use reqwest::StatusCode;
use std::fmt;

/// What went wrong when talking to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// No credential present. Expected for opt-in cloud providers.
    NotConfigured,
    /// The credential was rejected.
    InvalidCredential,
    /// The credential is valid but lacks access.
    PermissionDenied,
    /// Network failure or the service is down.
    Unreachable,
    /// The local engine is running but has nothing installed.
    NoModelsInstalled,
    /// The named model is not installed or not offered.
    ModelUnavailable(String),
    /// Anything else. Always logged with full detail.
    Unknown,
}

/// Coarse grouping used by callers that only care about the remedy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    Connectivity,
    ModelUnavailable,
    Unknown,
}

impl ProviderErrorKind {
    /// Collapse the kind into one of the four generation-time categories.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProviderErrorKind::NotConfigured
            | ProviderErrorKind::InvalidCredential
            | ProviderErrorKind::PermissionDenied => ErrorCategory::Auth,
            ProviderErrorKind::Unreachable => ErrorCategory::Connectivity,
            ProviderErrorKind::NoModelsInstalled | ProviderErrorKind::ModelUnavailable(_) => {
                ErrorCategory::ModelUnavailable
            }
            ProviderErrorKind::Unknown => ErrorCategory::Unknown,
        }
    }
}

/// A typed failure tagged with the provider that produced it.
///
/// `Display` renders the short user-facing sentence; the raw cause is kept
/// in `detail` for logs only.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: Provider,
    pub kind: ProviderErrorKind,
    pub detail: String,
}

impl ProviderError {
    pub fn new(provider: Provider, kind: ProviderErrorKind, detail: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_configured(provider: Provider) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::NotConfigured,
            "no credential configured",
        )
    }

    pub fn unknown(provider: Provider, detail: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Unknown, detail)
    }

    /// Whether this is the silent "not opted in" condition.
    pub fn is_not_configured(&self) -> bool {
        self.kind == ProviderErrorKind::NotConfigured
    }

    /// One actionable sentence: what went wrong and what to do about it.
    pub fn user_message(&self) -> String {
        let name = self.provider.display_name();
        let local = self.provider.is_local();

        match &self.kind {
            ProviderErrorKind::NotConfigured => format!(
                "{} API key is not configured. Add it in Settings to use {} models.",
                name, name
            ),
            ProviderErrorKind::InvalidCredential => format!(
                "{} API key is invalid. Please check your key in Settings.",
                name
            ),
            ProviderErrorKind::PermissionDenied => format!(
                "{} API key lacks required permissions. Please check your key in Settings.",
                name
            ),
            ProviderErrorKind::Unreachable if local => {
                "Ollama is not running. Please start Ollama to use local models.".to_string()
            }
            ProviderErrorKind::Unreachable => format!(
                "Unable to connect to {}. Please check your internet connection.",
                name
            ),
            ProviderErrorKind::NoModelsInstalled if local => {
                "No Ollama models installed. Install a model with: ollama pull llama3".to_string()
            }
            ProviderErrorKind::NoModelsInstalled => format!(
                "No {} models are available for text generation. Please check your account access.",
                name
            ),
            ProviderErrorKind::ModelUnavailable(model) if local => format!(
                "Ollama model '{}' is not installed. Please run: ollama pull {}",
                model, model
            ),
            ProviderErrorKind::ModelUnavailable(model) => format!(
                "{} model '{}' is not available. Please choose a different model.",
                name, model
            ),
            ProviderErrorKind::Unknown if local => {
                "Ollama service error. Please check Ollama installation and try again.".to_string()
            }
            ProviderErrorKind::Unknown => format!(
                "{} service error. Please check your API key and try again.",
                name
            ),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for ProviderError {}

/// Classify a non-success HTTP response.
///
/// `model` is the backend model the request targeted, if any; without it a
/// 404 cannot be attributed to a missing model.
pub fn classify_status(
    provider: Provider,
    status: StatusCode,
    body: &str,
    model: Option<&str>,
) -> ProviderError {
    let detail = format!("HTTP {}: {}", status, truncate(body, 500));
    let lowered = body.to_lowercase();

    let kind = match status {
        StatusCode::UNAUTHORIZED => ProviderErrorKind::InvalidCredential,
        StatusCode::FORBIDDEN => ProviderErrorKind::PermissionDenied,
        // Gemini reports a bad key as 400 INVALID_ARGUMENT.
        StatusCode::BAD_REQUEST
            if lowered.contains("api key") || lowered.contains("api_key_invalid") =>
        {
            ProviderErrorKind::InvalidCredential
        }
        StatusCode::NOT_FOUND => match model {
            Some(m) => ProviderErrorKind::ModelUnavailable(m.to_string()),
            None => ProviderErrorKind::Unknown,
        },
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ProviderErrorKind::Unreachable
        }
        _ => return classify_message(provider, &detail, model),
    };

    ProviderError::new(provider, kind, detail)
}

/// Classify a transport-level failure from reqwest.
pub fn classify_transport(provider: Provider, err: &reqwest::Error) -> ProviderError {
    if let Some(status) = err.status() {
        return classify_status(provider, status, &err.to_string(), None);
    }

    let kind = if err.is_connect() || err.is_timeout() || err.is_request() {
        ProviderErrorKind::Unreachable
    } else {
        ProviderErrorKind::Unknown
    };

    ProviderError::new(provider, kind, err.to_string())
}

/// Classify a free-form error message from an SDK.
///
/// Used where no status code survives, e.g. errors surfaced by async-openai.
pub fn classify_message(provider: Provider, message: &str, model: Option<&str>) -> ProviderError {
    let lowered = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lowered.contains(n));

    let kind = if has(&["401", "unauthorized", "authentication", "api key", "api_key"]) {
        ProviderErrorKind::InvalidCredential
    } else if has(&["403", "forbidden", "permission"]) {
        ProviderErrorKind::PermissionDenied
    } else if let (true, Some(m)) = (has(&["not found", "does not exist", "404"]), model) {
        ProviderErrorKind::ModelUnavailable(m.to_string())
    } else if has(&["connection", "connect", "refused", "unreachable", "timeout", "network"]) {
        ProviderErrorKind::Unreachable
    } else {
        ProviderErrorKind::Unknown
    };

    ProviderError::new(provider, kind, message)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
