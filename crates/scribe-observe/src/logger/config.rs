use std::io::IsTerminal;

use crate::logger::format::LoggerFormat;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `scribe_core=debug,axum=warn`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    /// Log each task span as it closes, with its `task_id` and timings.
    ///
    /// Ignored by journald output.
    pub span_events: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
            span_events: false,
        }
    }
}

impl LoggerConfig {
    pub fn new(format: LoggerFormat, level: impl Into<String>) -> Self {
        Self {
            format,
            level: level.into(),
            ..Self::default()
        }
    }

    pub fn with_span_events(mut self, on: bool) -> Self {
        self.span_events = on;
        self
    }
}
