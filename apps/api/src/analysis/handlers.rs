//! Axum route handlers for the Analysis API.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::analysis::{AnalysisResult, PipelineStage, SessionSnapshot};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub stage: PipelineStage,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/analysis
///
/// Last input, last completed result, and current stage. Read by the UI on open.
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.orchestrator.session().await)
}

/// POST /api/v1/analysis
///
/// Runs the full two-stage pipeline. Blocks until the run completes or fails.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Arc<AnalysisResult>>, AppError> {
    let result = state.orchestrator.run(&request.job_description).await?;
    Ok(Json(result))
}

/// DELETE /api/v1/analysis
///
/// Clears the stored input and result.
pub async fn handle_reset(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.orchestrator.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/analysis/stage
pub async fn handle_get_stage(State(state): State<AppState>) -> Json<StageResponse> {
    Json(StageResponse {
        stage: state.orchestrator.stage(),
    })
}

/// POST /api/v1/analysis/selection
///
/// Accepts text captured outside the UI (context-menu selection) as the next input.
pub async fn handle_selection(
    State(state): State<AppState>,
    Json(request): Json<SelectionRequest>,
) -> Result<StatusCode, AppError> {
    state.orchestrator.accept_selection(&request.text).await?;
    Ok(StatusCode::NO_CONTENT)
}
