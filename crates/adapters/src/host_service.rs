// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniform HTTP adapter for talking to out-of-process workers (C1),
//! grounded on `ktrdr/managers/async_host_service.py`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ops_core::{OpsError, OpsResult};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

/// Configuration for a [`HostServiceClient`], mirroring `HostServiceConfig`.
#[derive(Debug, Clone)]
pub struct HostServiceConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_connections: usize,
    pub keepalive: Duration,
    /// Carried through from configuration for parity with the source
    /// service's settings surface; not currently enforced against the pool
    /// (the source never wires it into connection recreation either).
    pub max_connection_age: Duration,
}

impl Default for HostServiceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            max_connections: 20,
            keepalive: Duration::from_secs(3600),
            max_connection_age: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Default)]
struct Metrics {
    requests_made: u64,
    errors_encountered: u64,
    by_status: HashMap<u16, u64>,
    by_endpoint: HashMap<String, u64>,
    response_times_ms: Vec<f64>,
    traces: HashMap<String, TraceRecord>,
}

/// A single request's trace record, kept when request tracing is enabled.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub request_id: String,
    pub endpoint: String,
    pub method: &'static str,
    pub duration_ms: f64,
    pub success: bool,
}

/// Snapshot of request counters (`get_statistics`/`get_detailed_metrics`).
#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    pub requests_made: u64,
    pub errors_encountered: u64,
    pub by_status: HashMap<u16, u64>,
    pub by_endpoint: HashMap<String, u64>,
}

/// Response-time percentiles (`get_latency_distribution`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTimeDistribution {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx]
}

/// Connection-pooled, retrying HTTP client for a single out-of-process
/// service. One instance per service (training host, IB host, a worker's
/// own endpoint); `service_name` and `health_endpoint` identify it in logs
/// and metrics.
pub struct HostServiceClient {
    service_name: &'static str,
    health_endpoint: String,
    config: HostServiceConfig,
    http: Mutex<Option<reqwest::Client>>,
    metrics: Mutex<Metrics>,
    health_cache: Mutex<Option<(Value, Instant)>>,
    trace_requests: bool,
}

impl HostServiceClient {
    pub fn new(service_name: &'static str, health_endpoint: impl Into<String>, config: HostServiceConfig, trace_requests: bool) -> Self {
        Self {
            service_name,
            health_endpoint: health_endpoint.into(),
            config,
            http: Mutex::new(None),
            metrics: Mutex::new(Metrics::default()),
            health_cache: Mutex::new(None),
            trace_requests,
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.service_name
    }

    /// Scoped acquisition of the underlying HTTP client: builds a pooled
    /// `reqwest::Client` and guarantees it's torn down when the returned
    /// guard drops, on every exit path (mirrors `__aenter__`/`__aexit__`).
    pub fn acquire(&self) -> OpsResult<HostServiceScope<'_>> {
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .pool_max_idle_per_host(self.config.max_connections)
            .pool_idle_timeout(self.config.keepalive)
            .build()
            .map_err(|e| OpsError::Configuration(e.to_string()))?;
        *self.http.lock() = Some(client);
        tracing::debug!(service = self.service_name, "connection pool initialized");
        Ok(HostServiceScope { client: self })
    }

    fn connected_client(&self) -> OpsResult<reqwest::Client> {
        self.http.lock().clone().ok_or_else(|| OpsError::Service {
            service: self.service_name.to_string(),
            message: "not initialized".to_string(),
        })
    }

    async fn call(&self, method: reqwest::Method, endpoint: &str, body: Option<&Value>, params: &[(&str, &str)]) -> OpsResult<Value> {
        let client = self.connected_client()?;
        let url = format!("{}{}", self.config.base_url, endpoint);
        let request_id = self.trace_requests.then(|| Uuid::new_v4().to_string());
        let start = Instant::now();

        for attempt in 0..=self.config.max_retries {
            let mut builder = client.request(method.clone(), &url);
            if let Some(body) = body {
                builder = builder.json(body);
            }
            if !params.is_empty() {
                builder = builder.query(params);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                    self.record_attempt(endpoint, Some(status.as_u16()), elapsed_ms);

                    if !status.is_success() {
                        self.record_error();
                        self.record_trace(request_id, endpoint, method.as_str(), elapsed_ms, false);
                        return Err(OpsError::Connection {
                            service: self.service_name.to_string(),
                            message: format!("HTTP {status} for {method} {endpoint}"),
                        });
                    }

                    let json = response.json::<Value>().await.map_err(|e| OpsError::Service {
                        service: self.service_name.to_string(),
                        message: e.to_string(),
                    })?;
                    self.record_trace(request_id, endpoint, method.as_str(), elapsed_ms, true);
                    return Ok(json);
                }
                Err(e) if e.is_timeout() => {
                    if attempt == self.config.max_retries {
                        self.record_error();
                        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                        self.record_trace(request_id, endpoint, method.as_str(), elapsed_ms, false);
                        return Err(OpsError::Timeout { service: self.service_name.to_string(), attempts: attempt + 1 });
                    }
                    let delay = Duration::from_secs(2u64.saturating_pow(attempt));
                    tracing::warn!(
                        service = self.service_name,
                        endpoint,
                        attempt = attempt + 1,
                        max_attempts = self.config.max_retries + 1,
                        "timeout, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.record_error();
                    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                    self.record_trace(request_id, endpoint, method.as_str(), elapsed_ms, false);
                    return Err(OpsError::Connection { service: self.service_name.to_string(), message: e.to_string() });
                }
            }
        }

        unreachable!("retry loop always returns")
    }

    fn record_attempt(&self, endpoint: &str, status: Option<u16>, elapsed_ms: f64) {
        let mut metrics = self.metrics.lock();
        metrics.requests_made += 1;
        *metrics.by_endpoint.entry(endpoint.to_string()).or_insert(0) += 1;
        if let Some(status) = status {
            *metrics.by_status.entry(status).or_insert(0) += 1;
        }
        metrics.response_times_ms.push(elapsed_ms);
    }

    fn record_error(&self) {
        self.metrics.lock().errors_encountered += 1;
    }

    fn record_trace(&self, request_id: Option<String>, endpoint: &str, method: &'static str, duration_ms: f64, success: bool) {
        let Some(request_id) = request_id else { return };
        self.metrics.lock().traces.insert(
            request_id.clone(),
            TraceRecord { request_id, endpoint: endpoint.to_string(), method, duration_ms, success },
        );
    }

    pub fn trace(&self, request_id: &str) -> Option<TraceRecord> {
        self.metrics.lock().traces.get(request_id).cloned()
    }

    pub fn statistics(&self) -> RequestStats {
        let metrics = self.metrics.lock();
        RequestStats {
            requests_made: metrics.requests_made,
            errors_encountered: metrics.errors_encountered,
            by_status: metrics.by_status.clone(),
            by_endpoint: metrics.by_endpoint.clone(),
        }
    }

    pub fn latency_distribution(&self) -> ResponseTimeDistribution {
        let metrics = self.metrics.lock();
        if metrics.response_times_ms.is_empty() {
            return ResponseTimeDistribution::default();
        }
        let mut sorted = metrics.response_times_ms.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let sum: f64 = sorted.iter().sum();
        ResponseTimeDistribution {
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            mean_ms: sum / sorted.len() as f64,
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
        }
    }

    pub fn reset_metrics(&self) {
        *self.metrics.lock() = Metrics::default();
    }

    pub fn clear_health_cache(&self) {
        *self.health_cache.lock() = None;
    }
}

/// A live, scoped acquisition of a [`HostServiceClient`]'s connection. All
/// requests go through here; dropping the scope releases the client.
pub struct HostServiceScope<'a> {
    client: &'a HostServiceClient,
}

impl HostServiceScope<'_> {
    pub async fn post(&self, endpoint: &str, body: &Value) -> OpsResult<Value> {
        self.client.call(reqwest::Method::POST, endpoint, Some(body), &[]).await
    }

    pub async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> OpsResult<Value> {
        self.client.call(reqwest::Method::GET, endpoint, None, params).await
    }

    /// `cache_ttl` of `None` always performs a live check; `Some(ttl)` reuses
    /// a cached response younger than `ttl`.
    pub async fn health(&self, cache_ttl: Option<Duration>) -> OpsResult<Value> {
        if let Some(ttl) = cache_ttl {
            if let Some((cached, at)) = self.client.health_cache.lock().clone() {
                if at.elapsed() < ttl {
                    tracing::debug!(service = self.client.service_name, "using cached health check result");
                    return Ok(cached);
                }
            }
        }

        let endpoint = self.client.health_endpoint.clone();
        let result = self.get(&endpoint, &[]).await?;

        if cache_ttl.is_some() {
            *self.client.health_cache.lock() = Some((result.clone(), Instant::now()));
        }
        tracing::info!(service = self.client.service_name, "health check passed");
        Ok(result)
    }
}

impl Drop for HostServiceScope<'_> {
    fn drop(&mut self) {
        *self.client.http.lock() = None;
        tracing::debug!(service = self.client.service_name, "connection pool cleaned up");
    }
}
