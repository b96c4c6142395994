//! Thin HTTP shell over the run coordinator.
//!
//! One coordinator per request; runs are independent and never share
//! browser state. Errors map to status codes via [`Error::http_status`].

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::config::AppConfig;
use crate::coordinator::RunCoordinator;
use crate::errors::{Error, Result};
use crate::llm::LlmInvoker;
use crate::prompts::validator::{PromptValidator, Severity};
use crate::types::TestInstruction;

/// Shared state of the HTTP shell.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub invoker: Arc<dyn LlmInvoker>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/providers", get(providers_handler))
        .route("/api/tests/execute", post(execute_handler))
        .route("/api/tests/generate-prompt", post(generate_prompt_handler))
        .route("/api/prompts/validate", post(validate_prompt_handler))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: AppConfig, invoker: Arc<dyn LlmInvoker>) -> Result<()> {
    let bind_addr = config.bind_addr.clone();
    let app = router(AppState { config, invoker });
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| Error::configuration(format!("could not bind {bind_addr}: {e}")))?;
    info!(%bind_addr, "http shell listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| Error::configuration(format!("server failed: {e}")))
}

fn error_response(err: Error) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({ "success": false, "error": err.to_string() })),
    )
        .into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "qapilot",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn providers_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "active": state.config.llm.provider.as_str(),
        "model": state.config.llm.model,
        "available": ["openai", "local"],
    }))
}

async fn execute_handler(
    State(state): State<AppState>,
    Json(instruction): Json<TestInstruction>,
) -> Response {
    let coordinator = RunCoordinator::new(state.config.clone(), state.invoker.clone());
    match coordinator.execute(&instruction).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Serialize)]
struct GeneratePromptResponse {
    success: bool,
    test_id: String,
    generated_prompt: String,
}

async fn generate_prompt_handler(
    State(state): State<AppState>,
    Json(instruction): Json<TestInstruction>,
) -> Response {
    let coordinator = RunCoordinator::new(state.config.clone(), state.invoker.clone());
    match coordinator.generate_prompt(&instruction).await {
        Ok(generated_prompt) => Json(GeneratePromptResponse {
            success: true,
            test_id: instruction.test_id,
            generated_prompt,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ValidatePromptRequest {
    prompt: String,
}

async fn validate_prompt_handler(Json(request): Json<ValidatePromptRequest>) -> Response {
    let report = PromptValidator::default().validate(&request.prompt);
    Json(json!({
        "success": true,
        "is_valid": report.is_valid(),
        "token_count": report.token_count,
        "summary": {
            "info": report.count(Severity::Info),
            "warning": report.count(Severity::Warning),
            "error": report.count(Severity::Error),
            "critical": report.count(Severity::Critical),
        },
        "findings": report.findings,
        "sanitized_prompt": report.sanitized_prompt,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds_with_default_state() {
        struct NullInvoker;

        #[async_trait::async_trait]
        impl LlmInvoker for NullInvoker {
            fn provider(&self) -> &str {
                "null"
            }

            fn model(&self) -> &str {
                "null"
            }

            async fn complete(
                &self,
                _messages: &[crate::types::ChatMessage],
            ) -> Result<String> {
                Ok(String::new())
            }
        }

        let state = AppState {
            config: AppConfig::defaults(),
            invoker: Arc::new(NullInvoker),
        };
        let _router = router(state);
    }
}
