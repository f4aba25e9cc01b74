use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder, proto::MetricFamily,
};
use scribe_core::MetricsBackend;
use scribe_model::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric registration failed: {0}")]
    Register(#[source] prometheus::Error),

    #[error("metric encoding failed: {0}")]
    Encode(#[source] prometheus::Error),

    #[error("metric output is not utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    submitted: IntCounter,
    finished: IntCounterVec,
    in_use: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Register the gateway metrics in an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let submitted = IntCounter::new(
            "scribe_tasks_submitted_total",
            "Transcription requests accepted by the gateway",
        )
        .map_err(MetricsError::Register)?;
        let finished = IntCounterVec::new(
            Opts::new(
                "scribe_tasks_finished_total",
                "Tasks that reached a terminal status",
            ),
            &["status"],
        )
        .map_err(MetricsError::Register)?;
        let in_use = IntGauge::new(
            "scribe_admission_in_use",
            "Admission slots currently held by monitors",
        )
        .map_err(MetricsError::Register)?;

        registry
            .register(Box::new(submitted.clone()))
            .map_err(MetricsError::Register)?;
        registry
            .register(Box::new(finished.clone()))
            .map_err(MetricsError::Register)?;
        registry
            .register(Box::new(in_use.clone()))
            .map_err(MetricsError::Register)?;

        Ok(Self {
            registry,
            submitted,
            finished,
            in_use,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, ready for a `/metrics` response body.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.gather(), &mut buf)
            .map_err(MetricsError::Encode)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn task_submitted(&self) {
        self.submitted.inc();
    }

    fn task_finished(&self, status: TaskStatus) {
        self.finished.with_label_values(&[status.as_str()]).inc();
    }

    fn admission_in_use(&self, in_use: usize) {
        self.in_use.set(i64::try_from(in_use).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let m = PrometheusMetrics::new().unwrap();
        m.task_submitted();
        m.task_submitted();
        m.task_finished(TaskStatus::Completed);
        m.task_finished(TaskStatus::Timeout);
        m.admission_in_use(3);

        let text = m.encode_text().unwrap();
        assert!(text.contains("scribe_tasks_submitted_total 2"));
        assert!(text.contains(r#"scribe_tasks_finished_total{status="completed"} 1"#));
        assert!(text.contains(r#"scribe_tasks_finished_total{status="timeout"} 1"#));
        assert!(text.contains("scribe_admission_in_use 3"));
    }

    #[test]
    fn gauge_follows_latest_value() {
        let m = PrometheusMetrics::new().unwrap();
        m.admission_in_use(5);
        m.admission_in_use(1);
        assert_eq!(m.in_use.get(), 1);
    }

    #[test]
    fn double_registration_is_an_error() {
        let registry = Registry::new();
        let _first = PrometheusMetrics::with_registry(registry.clone()).unwrap();
        assert!(matches!(
            PrometheusMetrics::with_registry(registry),
            Err(MetricsError::Register(_))
        ));
    }
}
