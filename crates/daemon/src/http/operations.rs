// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation lifecycle routes: create, observe, transition.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use ops_adapters::{HostServiceClient, HostServiceConfig};
use ops_core::{OperationId, OperationMetadata, OperationProgress, OperationStatus, OperationType, OpsError, WorkerId};
use ops_engine::ListFilter;
use serde::{Deserialize, Serialize};

use super::{ApiError, Envelope};
use crate::lifecycle::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOperationRequest {
    pub operation_type: OperationType,
    #[serde(default)]
    pub metadata: OperationMetadata,
    pub operation_id: Option<String>,
    pub parent_operation_id: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOperationRequest>,
) -> Result<Json<Envelope<ops_core::OperationInfo>>, ApiError> {
    let info = state
        .operations
        .create_operation(
            request.operation_type,
            request.metadata,
            request.operation_id.map(OperationId::from_string),
            request.parent_operation_id.map(OperationId::from_string),
        )
        .await?;
    Ok(Envelope::ok(info))
}

#[derive(Debug, Deserialize, Default)]
pub struct GetQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(operation_id): Path<String>,
    Query(query): Query<GetQuery>,
) -> Result<Json<Envelope<ops_core::OperationInfo>>, ApiError> {
    let id = OperationId::from_string(operation_id.clone());

    let info = if query.force_refresh {
        refresh_operation(&state, &id).await?
    } else {
        state.operations.get_operation(&id).await?
    };

    match info {
        Some(info) => Ok(Envelope::ok(info)),
        None => Err(ApiError(OpsError::not_found(operation_id))),
    }
}

/// Implements `?force_refresh=true` (§6): a worker-owned, non-backend-local
/// operation is re-fetched straight from the worker claiming it over C1
/// (§6 "the control plane proxies to the worker claiming an id"), since the
/// worker's own in-memory state is more current than anything the control
/// plane has cached or persisted. Any other case (no worker, backend-local,
/// or the worker proxy fails) falls back to a direct, cache-bypassing read
/// of the repository.
async fn refresh_operation(state: &AppState, id: &OperationId) -> Result<Option<ops_core::OperationInfo>, ApiError> {
    let Some(current) = state.operations.get_operation(id).await? else { return Ok(None) };

    if !current.is_backend_local {
        if let Some(worker_id) = &current.worker_id {
            if let Some(worker) = state.workers.get_worker(&WorkerId::new(worker_id.clone())) {
                match proxy_worker_operation(&worker.endpoint_url, id).await {
                    Ok(Some(fresh)) => return Ok(Some(fresh)),
                    Ok(None) => {}
                    Err(err) => tracing::warn!(%id, %worker_id, %err, "force_refresh: worker proxy failed, falling back to storage"),
                }
            }
        }
    }

    state.operations.refresh_from_repository(id).await.map_err(ApiError)
}

/// Proxies `GET /api/v1/operations/{id}` to the worker's own endpoint
/// through a short-lived C1 client.
async fn proxy_worker_operation(endpoint_url: &str, id: &OperationId) -> Result<Option<ops_core::OperationInfo>, OpsError> {
    let config = HostServiceConfig { base_url: endpoint_url.to_string(), timeout: Duration::from_secs(10), ..HostServiceConfig::default() };
    let client = HostServiceClient::new("worker", "/health", config, false);
    let scope = client.acquire()?;
    let body = scope.get(&format!("/api/v1/operations/{id}"), &[]).await?;
    let data = body.get("data").cloned().unwrap_or(serde_json::Value::Null);
    Ok(serde_json::from_value(data).ok())
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub status: Option<OperationStatus>,
    pub operation_type: Option<OperationType>,
    pub worker_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Serialize)]
pub struct ListResponseBody {
    pub items: Vec<ops_core::OperationInfo>,
    pub total_count: usize,
    pub active_count: usize,
}

pub async fn list(State(state): State<Arc<AppState>>, Query(query): Query<ListQuery>) -> Json<Envelope<ListResponseBody>> {
    let result = state
        .operations
        .list_operations(ListFilter {
            status: query.status,
            operation_type: query.operation_type,
            worker_id: query.worker_id,
            limit: query.limit,
            offset: query.offset,
            active_only: query.active_only,
        })
        .await;
    Envelope::ok(ListResponseBody { items: result.items, total_count: result.total_count, active_count: result.active_count })
}

#[derive(Debug, Deserialize, Default)]
pub struct MetricsQuery {
    pub cursor: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MetricsBody {
    pub metrics: Vec<serde_json::Value>,
    pub cursor: usize,
}

/// Incremental metrics retrieval (§6): `metrics` is stored as an append-only
/// JSON array, and `cursor` indexes into it. Returns every entry from
/// `cursor` onward plus the new cursor to resume from.
pub async fn metrics(
    State(state): State<Arc<AppState>>,
    Path(operation_id): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Envelope<MetricsBody>>, ApiError> {
    let id = OperationId::from_string(operation_id.clone());
    let Some(info) = state.operations.get_operation(&id).await? else {
        return Err(ApiError(OpsError::not_found(operation_id)));
    };
    let entries = info.metrics.as_ref().and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let cursor = query.cursor.unwrap_or(0).min(entries.len());
    let page: Vec<serde_json::Value> = entries.into_iter().skip(cursor).collect();
    let new_cursor = cursor + page.len();
    Ok(Envelope::ok(MetricsBody { metrics: page, cursor: new_cursor }))
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub worker_id: Option<String>,
}

pub async fn start(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>, Json(request): Json<StartRequest>) -> Result<Json<Envelope<bool>>, ApiError> {
    state.operations.start_operation(&OperationId::from_string(operation_id), request.worker_id, None).await?;
    Ok(Envelope::ok(true))
}

pub async fn update_progress(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>, Json(progress): Json<OperationProgress>) -> Json<Envelope<bool>> {
    state.operations.update_progress(&OperationId::from_string(operation_id), progress);
    Envelope::ok(true)
}

#[derive(Debug, Deserialize, Default)]
pub struct CompleteRequest {
    pub result_summary: Option<serde_json::Value>,
}

pub async fn complete(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>, Json(request): Json<CompleteRequest>) -> Json<Envelope<bool>> {
    state.operations.complete_operation(&OperationId::from_string(operation_id), request.result_summary).await;
    Envelope::ok(true)
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub error_message: String,
    #[serde(default)]
    pub fail_parent: bool,
}

pub async fn fail(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>, Json(request): Json<FailRequest>) -> Json<Envelope<bool>> {
    state.operations.fail_operation(&OperationId::from_string(operation_id), request.error_message, request.fail_parent).await;
    Envelope::ok(true)
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub already_terminal: bool,
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(operation_id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Envelope<CancelResponse>>, ApiError> {
    let outcome = state.operations.cancel_operation(&OperationId::from_string(operation_id), request.reason).await?;
    Ok(Envelope::ok(CancelResponse { success: outcome.success, already_terminal: outcome.already_terminal }))
}

pub async fn retry(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>) -> Result<Json<Envelope<ops_core::OperationInfo>>, ApiError> {
    let retried = state.operations.retry_operation(&OperationId::from_string(operation_id)).await?;
    Ok(Envelope::ok(retried))
}

pub async fn resume(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>) -> Result<Json<Envelope<ops_engine::ResumeOutcome>>, ApiError> {
    let outcome = state.resume.resume_operation(&OperationId::from_string(operation_id)).await?;
    Ok(Envelope::ok(outcome))
}

pub async fn children(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>) -> Json<Envelope<Vec<ops_core::OperationInfo>>> {
    let items = state.operations.get_children(&OperationId::from_string(operation_id)).await;
    Envelope::ok(items)
}

pub async fn aggregated_progress(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>) -> Json<Envelope<AggregatedProgressBody>> {
    let aggregated = state.operations.get_aggregated_progress(&OperationId::from_string(operation_id)).await;
    Envelope::ok(AggregatedProgressBody { percentage: aggregated.percentage, phase_label: aggregated.phase_label })
}

#[derive(Debug, Serialize)]
pub struct AggregatedProgressBody {
    pub percentage: f64,
    pub phase_label: Option<String>,
}

