//! Prometheus metrics backend for the transcription gateway.
//!
//! [`PrometheusMetrics`] implements [`scribe_core::MetricsBackend`] over its own
//! [`Registry`], so several gateways in one process never collide.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use scribe_core::MetricsHandle;
//! use scribe_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//! # let _ = handle;
//!
//! // Serve this from `/metrics`.
//! let body = metrics.encode_text()?;
//! assert!(body.contains("scribe_admission_in_use"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `scribe_tasks_submitted_total` - Counter
//! - `scribe_tasks_finished_total{status}` - Counter
//! - `scribe_admission_in_use` - Gauge

mod backend;
pub use backend::{MetricsError, PrometheusMetrics};

pub use prometheus::{Encoder, Registry, TextEncoder};
