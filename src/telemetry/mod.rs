// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging and metrics.
//!
//! - **Tracing**: structured `tracing` events, written to stderr by the
//!   subscriber installed with [`init_telemetry`].
//! - **Metrics**: open, discovery and tool call latencies in
//!   [`GLOBAL_METRICS`], recorded when the `telemetry` feature is enabled.
//!
//! ```rust,ignore
//! use agentcli::telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::from_verbosity(1))?;
//! ```

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig};
pub use metrics::{
    Histogram, Metrics, MetricsSnapshot, OperationMetrics, ToolMetrics, GLOBAL_METRICS,
};
