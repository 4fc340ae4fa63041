//! HTTP request handlers

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::costs::tracker::{CostTracker, EnvironmentUsage, SavingsPeriod, SavingsSummary};
use crate::deploy::orchestrator::DeploymentOrchestrator;
use crate::engines::EngineKind;
use crate::errors::PipeformError;
use crate::models::deployment::Deployment;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "pipeform".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_status(error: &PipeformError) -> StatusCode {
    match error {
        PipeformError::SelectionError(_) | PipeformError::ValidationError(_) => {
            StatusCode::BAD_REQUEST
        }
        PipeformError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_error_response(error: PipeformError) -> (StatusCode, Json<ErrorResponse>) {
    (
        error_status(&error),
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Deployment request body
#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub environment: String,

    /// Consumed by the engine guard; kept so the body deserializes cleanly
    #[serde(default)]
    pub engine: Option<String>,
}

/// Deployment handler.
///
/// The engine guard middleware has already resolved the engine and attached
/// it to the request extensions; factory construction can still fail when
/// the engine is unavailable or not installed.
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Extension(engine): Extension<EngineKind>,
    Json(request): Json<DeployRequest>,
) -> Result<Json<Deployment>, (StatusCode, Json<ErrorResponse>)> {
    if request.environment.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "environment must not be empty".to_string(),
            }),
        ));
    }

    let adapter = state
        .factory
        .create(engine)
        .await
        .map_err(into_error_response)?;

    let orchestrator = DeploymentOrchestrator::new(
        adapter,
        state.tracker.clone(),
        state.history.clone(),
        state.active.clone(),
        state.deploy_settings.clone(),
    );

    let deployment = orchestrator
        .deploy(&request.environment)
        .await
        .map_err(into_error_response)?;

    Ok(Json(deployment))
}

/// History query
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Deployment history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub deployments: Vec<Deployment>,
    pub total: usize,
}

/// Recent deployments handler
pub async fn deployments_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let deployments = state
        .history
        .recent(query.limit.unwrap_or(20))
        .await
        .map_err(into_error_response)?;

    let total = deployments.len();
    Ok(Json(HistoryResponse { deployments, total }))
}

/// Savings query
#[derive(Debug, Deserialize)]
pub struct SavingsQuery {
    pub period: Option<String>,
}

/// Savings response with inline recommendations
#[derive(Debug, Serialize)]
pub struct SavingsResponse {
    #[serde(flatten)]
    pub summary: SavingsSummary,
    pub recommendations: Vec<String>,
}

/// Period savings handler
pub async fn savings_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<SavingsQuery>,
) -> Result<Json<SavingsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let period = match query.period.as_deref() {
        None => SavingsPeriod::Month,
        Some(name) => SavingsPeriod::parse(name).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("unknown period '{}'; expected month or quarter", name),
                }),
            )
        })?,
    };

    let summary = state
        .tracker
        .calculate_savings(period)
        .await
        .map_err(into_error_response)?;

    let recommendations = CostTracker::generate_recommendations(&summary);
    Ok(Json(SavingsResponse {
        summary,
        recommendations,
    }))
}

/// ROI query
#[derive(Debug, Deserialize)]
pub struct RoiQuery {
    pub implementation_cost: f64,
}

/// ROI handler
pub async fn roi_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RoiQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    if query.implementation_cost <= 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "implementation_cost must be positive".to_string(),
            }),
        ));
    }

    let roi = state
        .tracker
        .calculate_roi(query.implementation_cost)
        .await
        .map_err(into_error_response)?;

    Ok(Json(roi))
}

/// Environment breakdown response
#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub environments: BTreeMap<String, EnvironmentUsage>,
}

/// Environment breakdown handler
pub async fn breakdown_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<BreakdownResponse>, (StatusCode, Json<ErrorResponse>)> {
    let environments = state
        .tracker
        .environment_breakdown()
        .await
        .map_err(into_error_response)?;

    Ok(Json(BreakdownResponse { environments }))
}
