//! HTTP API server for the notebook frontend.
//!
//! Provides model discovery, connection tests, the generation pipelines and
//! source listing as JSON endpoints.

use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::error::NotebookError;
use crate::export::ExportRequest;
use crate::orchestrator::Notebook;
use crate::provider::{ModelDescriptor, Provider};
use crate::transcription::Transcript;
use crate::vector_store::{NewTemplate, TemplateUpdate};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    notebook: Arc<Notebook>,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: &str,
    port: u16,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> anyhow::Result<()> {
    let notebook = Notebook::new(settings, credentials)?;
    let app = api_router(Arc::new(notebook));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Notebook API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("All models", "GET  /models/all");
    Output::kv("Provider models", "GET  /models/{provider}");
    Output::kv("Test provider", "POST /test-api/{provider}");
    Output::kv("Test all", "GET  /test-api/status");
    Output::kv("Ask", "POST /query");
    Output::kv("Summarize", "POST /summarize");
    Output::kv("Overview", "POST /overview");
    Output::kv("Report", "POST /report");
    Output::kv("Templates", "GET  /templates");
    Output::kv("Export", "POST /export");
    Output::kv("Sources", "GET  /sources");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API routes around a notebook.
pub fn api_router(notebook: Arc<Notebook>) -> Router {
    let state = Arc::new(AppState { notebook });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/health", get(health))
        .route("/models/all", get(all_models))
        .route("/models/{provider}", get(provider_models))
        .route("/test-api/status", get(test_status))
        .route("/test-api/{provider}", post(test_provider))
        .route("/query", post(query))
        .route("/summarize", post(summarize))
        .route("/overview", post(overview))
        .route("/report", post(report))
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/{template_id}",
            put(update_template).delete(delete_template),
        )
        .route("/export", post(export))
        .route("/sources", get(list_sources))
        .route("/sources/{source_id}", get(get_source))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Serialize)]
struct AllModelsResponse {
    models: Vec<ModelDescriptor>,
    count: usize,
    providers: BTreeMap<Provider, usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    provider_errors: BTreeMap<Provider, String>,
}

#[derive(Serialize)]
struct ProviderModelsResponse {
    models: Vec<ModelDescriptor>,
    count: usize,
    provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Deserialize)]
struct QueryRequest {
    source_id: i64,
    query_text: String,
    #[serde(default)]
    model_key: Option<String>,
}

#[derive(Deserialize)]
struct SourceRequest {
    source_id: i64,
    #[serde(default)]
    model_key: Option<String>,
}

/// Either a stored template id or inline template text.
#[derive(Deserialize)]
struct ReportRequest {
    source_id: i64,
    #[serde(default)]
    template_id: Option<i64>,
    #[serde(default)]
    template_text: Option<String>,
    #[serde(default)]
    model_key: Option<String>,
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
    prompt: String,
}

#[derive(Serialize)]
struct OverviewResponse {
    summary_text: String,
    prompt: String,
}

#[derive(Serialize)]
struct ReportResponse {
    report_text: String,
    prompt: String,
}

#[derive(Serialize)]
struct SourceInfo {
    source_id: i64,
    title: String,
    segment_count: usize,
    duration_seconds: f64,
    stored_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct SourceDetail {
    source_id: i64,
    title: String,
    transcript: Transcript,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: &NotebookError) -> Response {
    let status = match e {
        NotebookError::NotFound(_) => StatusCode::NOT_FOUND,
        NotebookError::UnsupportedModel(_) | NotebookError::InvalidInput(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => {
            error!("Request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn invalid_provider(name: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "success": false,
            "message": "Invalid provider. Must be one of: ollama, openai, anthropic, google",
            "provider": name,
        })),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn all_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.notebook.discover_models().await;
    Json(AllModelsResponse {
        count: result.count(),
        providers: result.provider_counts(),
        models: result.models,
        provider_errors: result.provider_errors,
    })
}

async fn provider_models(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let Ok(provider) = name.parse::<Provider>() else {
        return invalid_provider(&name);
    };

    let (models, error) = match state.notebook.discovery().list_provider(provider).await {
        Ok(models) => (models, None),
        Err(NotebookError::Provider(e)) if e.is_not_configured() => (Vec::new(), None),
        Err(NotebookError::Provider(e)) => {
            info!("{} provider error: {}", provider.display_name(), e.detail);
            (Vec::new(), Some(e.user_message()))
        }
        Err(e) => return error_response(&e),
    };

    state.notebook.router().register_discovered(&models);
    Json(ProviderModelsResponse {
        count: models.len(),
        models,
        provider,
        error,
    })
    .into_response()
}

async fn test_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.notebook.discovery().test_all().await)
}

async fn test_provider(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let Ok(provider) = name.parse::<Provider>() else {
        return invalid_provider(&name);
    };
    let discovery = state.notebook.discovery();
    let Some(adapter) = discovery.adapter(provider) else {
        return invalid_provider(&name);
    };

    let status = adapter.test_connection().await;
    let code = if status.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, Json(status)).into_response()
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    match state
        .notebook
        .ask(req.source_id, &req.query_text, req.model_key.as_deref())
        .await
    {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SourceRequest>,
) -> impl IntoResponse {
    match state
        .notebook
        .summarize(req.source_id, req.model_key.as_deref())
        .await
    {
        Ok(generated) => Json(SummaryResponse {
            summary: generated.text,
            prompt: generated.prompt,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn overview(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SourceRequest>,
) -> impl IntoResponse {
    match state
        .notebook
        .overview(req.source_id, req.model_key.as_deref())
        .await
    {
        Ok(generated) => Json(OverviewResponse {
            summary_text: generated.text,
            prompt: generated.prompt,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> impl IntoResponse {
    let model_key = req.model_key.as_deref();
    let result = match req.template_id {
        Some(id) => {
            state
                .notebook
                .report_with_template(req.source_id, id, model_key)
                .await
        }
        None => {
            let text = req.template_text.unwrap_or_default();
            state.notebook.report(req.source_id, &text, model_key).await
        }
    };
    match result {
        Ok(generated) => Json(ReportResponse {
            report_text: generated.text,
            prompt: generated.prompt,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_sources(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.notebook.sources().await {
        Ok(sources) => Json(
            sources
                .into_iter()
                .map(|s| SourceInfo {
                    source_id: s.source_id,
                    segment_count: s.transcript.segments.len(),
                    duration_seconds: s.transcript.duration_seconds(),
                    title: s.title,
                    stored_at: s.stored_at,
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_source(
    State(state): State<Arc<AppState>>,
    Path(source_id): Path<i64>,
) -> impl IntoResponse {
    match state.notebook.source(source_id).await {
        Ok(stored) => Json(SourceDetail {
            source_id: stored.source_id,
            title: stored.title,
            transcript: stored.transcript,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_templates(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.notebook.templates().await {
        Ok(templates) => Json(templates).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn create_template(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTemplate>,
) -> impl IntoResponse {
    match state.notebook.create_template(&req).await {
        Ok(template) => (StatusCode::CREATED, Json(template)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn update_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<i64>,
    Json(req): Json<TemplateUpdate>,
) -> impl IntoResponse {
    match state.notebook.update_template(template_id, req).await {
        Ok(template) => Json(template).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<i64>,
) -> impl IntoResponse {
    match state.notebook.delete_template(template_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn export(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExportRequest>,
) -> impl IntoResponse {
    match state.notebook.export(&req).await {
        Ok(exported) => (
            [
                (header::CONTENT_TYPE, exported.content_type().to_string()),
                (header::CONTENT_DISPOSITION, exported.disposition()),
            ],
            exported.content,
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
