// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ops-adapters: the Host-Service HTTP Adapter (C1) used to reach
//! out-of-process workers and external host services.

pub mod host_service;

pub use host_service::{HostServiceClient, HostServiceConfig, HostServiceScope, RequestStats, ResponseTimeDistribution, TraceRecord};
