// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin HTTP client for the `/api/v1` surface exposed by `opsd`.

use ops_core::{
    CheckpointData, CheckpointType, CompletedOperationReport, OperationInfo, OperationMetadata,
    OperationProgress, OperationStatus, OperationType, WorkerId, WorkerInfo,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

pub struct DaemonClient {
    base_url: String,
    http: reqwest::Client,
}

impl DaemonClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http: reqwest::Client::new() }
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, ClientError> {
        if response.status().is_success() {
            Ok(response.json::<Envelope<T>>().await?.data)
        } else {
            let body = response.json::<ErrorEnvelope>().await.map(|e| e.error).unwrap_or_else(|_| "request failed".to_string());
            Err(ClientError::Api(body))
        }
    }

    pub async fn create_operation(
        &self,
        operation_type: OperationType,
        metadata: OperationMetadata,
        operation_id: Option<String>,
        parent_operation_id: Option<String>,
    ) -> Result<OperationInfo, ClientError> {
        #[derive(Serialize)]
        struct Body {
            operation_type: OperationType,
            metadata: OperationMetadata,
            operation_id: Option<String>,
            parent_operation_id: Option<String>,
        }
        let response = self
            .http
            .post(format!("{}/api/v1/operations", self.base_url))
            .json(&Body { operation_type, metadata, operation_id, parent_operation_id })
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn get_operation(&self, operation_id: &str, force_refresh: bool) -> Result<OperationInfo, ClientError> {
        let mut request = self.http.get(format!("{}/api/v1/operations/{operation_id}", self.base_url));
        if force_refresh {
            request = request.query(&[("force_refresh", "true")]);
        }
        Self::decode(request.send().await?).await
    }

    pub async fn list_operations(&self, filter: ListOperationsFilter) -> Result<ListOperationsBody, ClientError> {
        let mut request = self.http.get(format!("{}/api/v1/operations", self.base_url));
        if let Some(status) = filter.status {
            request = request.query(&[("status", serde_json::to_value(status).unwrap_or_default().as_str().unwrap_or_default().to_string())]);
        }
        if let Some(operation_type) = filter.operation_type {
            request = request.query(&[("operation_type", serde_json::to_value(operation_type).unwrap_or_default().as_str().unwrap_or_default().to_string())]);
        }
        if let Some(worker_id) = filter.worker_id {
            request = request.query(&[("worker_id", worker_id)]);
        }
        if let Some(limit) = filter.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        if let Some(offset) = filter.offset {
            request = request.query(&[("offset", offset.to_string())]);
        }
        if filter.active_only {
            request = request.query(&[("active_only", "true")]);
        }
        Self::decode(request.send().await?).await
    }

    pub async fn get_metrics(&self, operation_id: &str, cursor: Option<usize>) -> Result<MetricsBody, ClientError> {
        let mut request = self.http.get(format!("{}/api/v1/operations/{operation_id}/metrics", self.base_url));
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor.to_string())]);
        }
        Self::decode(request.send().await?).await
    }

    pub async fn start_operation(&self, operation_id: &str, worker_id: Option<String>) -> Result<(), ClientError> {
        #[derive(Serialize)]
        struct Body {
            worker_id: Option<String>,
        }
        let response = self
            .http
            .post(format!("{}/api/v1/operations/{operation_id}/start", self.base_url))
            .json(&Body { worker_id })
            .send()
            .await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }

    pub async fn update_progress(&self, operation_id: &str, progress: OperationProgress) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/operations/{operation_id}/progress", self.base_url))
            .json(&progress)
            .send()
            .await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }

    pub async fn complete_operation(&self, operation_id: &str, result_summary: Option<serde_json::Value>) -> Result<(), ClientError> {
        #[derive(Serialize)]
        struct Body {
            result_summary: Option<serde_json::Value>,
        }
        let response = self
            .http
            .post(format!("{}/api/v1/operations/{operation_id}/complete", self.base_url))
            .json(&Body { result_summary })
            .send()
            .await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }

    pub async fn fail_operation(&self, operation_id: &str, error_message: String, fail_parent: bool) -> Result<(), ClientError> {
        #[derive(Serialize)]
        struct Body {
            error_message: String,
            fail_parent: bool,
        }
        let response = self
            .http
            .post(format!("{}/api/v1/operations/{operation_id}/fail", self.base_url))
            .json(&Body { error_message, fail_parent })
            .send()
            .await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }

    pub async fn cancel_operation(&self, operation_id: &str, reason: Option<String>) -> Result<(bool, bool), ClientError> {
        #[derive(Serialize)]
        struct Body {
            reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct Outcome {
            success: bool,
            already_terminal: bool,
        }
        let response = self
            .http
            .delete(format!("{}/api/v1/operations/{operation_id}/cancel", self.base_url))
            .json(&Body { reason })
            .send()
            .await?;
        let outcome: Outcome = Self::decode(response).await?;
        Ok((outcome.success, outcome.already_terminal))
    }

    pub async fn retry_operation(&self, operation_id: &str) -> Result<OperationInfo, ClientError> {
        let response = self.http.post(format!("{}/api/v1/operations/{operation_id}/retry", self.base_url)).send().await?;
        Self::decode(response).await
    }

    pub async fn resume_operation(&self, operation_id: &str) -> Result<ops_engine_wire::ResumeOutcomeBody, ClientError> {
        let response = self.http.post(format!("{}/api/v1/operations/{operation_id}/resume", self.base_url)).send().await?;
        Self::decode(response).await
    }

    pub async fn children(&self, operation_id: &str) -> Result<Vec<OperationInfo>, ClientError> {
        let response = self.http.get(format!("{}/api/v1/operations/{operation_id}/children", self.base_url)).send().await?;
        Self::decode(response).await
    }

    pub async fn aggregated_progress(&self, operation_id: &str) -> Result<AggregatedProgressBody, ClientError> {
        let response = self.http.get(format!("{}/api/v1/operations/{operation_id}/aggregated-progress", self.base_url)).send().await?;
        Self::decode(response).await
    }

    pub async fn register_worker(
        &self,
        worker_id: String,
        worker_type: String,
        endpoint_url: String,
        completed_operations: Vec<CompletedOperationReport>,
    ) -> Result<(), ClientError> {
        #[derive(Serialize)]
        struct Body {
            worker_id: String,
            worker_type: String,
            endpoint_url: String,
            completed_operations: Vec<CompletedOperationReport>,
        }
        let response = self
            .http
            .post(format!("{}/api/v1/workers/register", self.base_url))
            .json(&Body { worker_id, worker_type, endpoint_url, completed_operations })
            .send()
            .await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerInfo>, ClientError> {
        let response = self.http.get(format!("{}/api/v1/workers", self.base_url)).send().await?;
        Self::decode(response).await
    }

    pub async fn get_worker(&self, worker_id: &str) -> Result<WorkerInfo, ClientError> {
        let response = self.http.get(format!("{}/api/v1/workers/{worker_id}", self.base_url)).send().await?;
        Self::decode(response).await
    }

    pub async fn mark_busy(&self, worker_id: &WorkerId, operation_id: &str) -> Result<(), ClientError> {
        #[derive(Serialize)]
        struct Body<'a> {
            operation_id: &'a str,
        }
        let response = self
            .http
            .post(format!("{}/api/v1/workers/{worker_id}/busy", self.base_url))
            .json(&Body { operation_id })
            .send()
            .await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }

    pub async fn mark_idle(&self, worker_id: &str) -> Result<(), ClientError> {
        let response = self.http.post(format!("{}/api/v1/workers/{worker_id}/idle", self.base_url)).send().await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }

    pub async fn save_checkpoint(
        &self,
        operation_id: &str,
        checkpoint_type: CheckpointType,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), ClientError> {
        #[derive(Serialize)]
        struct Body {
            checkpoint_type: CheckpointType,
            metadata: Option<serde_json::Value>,
        }
        let response = self
            .http
            .post(format!("{}/api/v1/checkpoints/{operation_id}", self.base_url))
            .json(&Body { checkpoint_type, metadata })
            .send()
            .await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }

    pub async fn load_checkpoint(&self, operation_id: &str) -> Result<CheckpointData, ClientError> {
        let response = self.http.get(format!("{}/api/v1/checkpoints/{operation_id}", self.base_url)).send().await?;
        Self::decode(response).await
    }

    pub async fn delete_checkpoint(&self, operation_id: &str) -> Result<(), ClientError> {
        let response = self.http.delete(format!("{}/api/v1/checkpoints/{operation_id}", self.base_url)).send().await?;
        Self::decode::<bool>(response).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AggregatedProgressBody {
    pub percentage: f64,
    pub phase_label: Option<String>,
}

/// Filters accepted by [`DaemonClient::list_operations`], mirroring
/// `ops_engine::ListFilter`'s wire shape.
#[derive(Debug, Clone, Default)]
pub struct ListOperationsFilter {
    pub status: Option<OperationStatus>,
    pub operation_type: Option<OperationType>,
    pub worker_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub active_only: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListOperationsBody {
    pub items: Vec<OperationInfo>,
    pub total_count: usize,
    pub active_count: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MetricsBody {
    pub metrics: Vec<serde_json::Value>,
    pub cursor: usize,
}

/// Mirrors `ops_engine::ResumeOutcome`'s wire shape without pulling the whole
/// engine crate into the CLI's dependency graph.
pub mod ops_engine_wire {
    use ops_core::OperationId;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct ResumeOutcomeBody {
        pub success: bool,
        pub original_operation_id: OperationId,
        pub new_operation_id: OperationId,
        pub resumed_from_checkpoint: bool,
    }
}
