//! Gateway side of the transcription service.
//!
//! Tracks every submitted task in a [`Ledger`], bounds concurrent monitoring with an
//! [`AdmissionPool`] and drives one [`Monitor`] per task over the job and control channels.

mod error;
pub use error::CoreError;

mod config;
pub use config::{GatewayConfig, MonitorConfig};

mod ledger;
pub use ledger::Ledger;

mod admission;
pub use admission::{AdmissionPool, AdmissionSlot};

mod metrics;
pub use metrics::{MetricsBackend, MetricsHandle, NoopMetrics};

mod monitor;
pub use monitor::{AbortReason, Monitor, MonitorContext, MonitorOutcome};

mod gateway;
pub use gateway::Gateway;
