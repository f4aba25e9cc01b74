use std::io;

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, MakeWriter, format::FmtSpan, time::OffsetTime},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError};

pub(crate) struct Logger;

impl Logger {
    pub(crate) fn text(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        init_with(
            tracing_subscriber::registry()
                .with(filter(&cfg.level)?)
                .with(text_layer(cfg, io::stdout)),
        )
    }

    pub(crate) fn json(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        init_with(
            tracing_subscriber::registry()
                .with(filter(&cfg.level)?)
                .with(json_layer(cfg, io::stdout)),
        )
    }

    pub(crate) fn journald(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        journald_with(filter(&cfg.level)?)
    }
}

fn span_events(cfg: &LoggerConfig) -> FmtSpan {
    if cfg.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Human-readable lines; span fields such as `task_id` prefix each event.
fn text_layer<S, W>(cfg: &LoggerConfig, writer: W) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_ansi(cfg.use_color)
        .with_target(cfg.with_targets)
        .with_span_events(span_events(cfg))
        .with_timer(local_rfc3339())
        .with_writer(writer)
}

/// One JSON object per event. Only the innermost span is kept; every task span
/// carries its own `task_id`, so the ancestry list adds nothing.
fn json_layer<S, W>(cfg: &LoggerConfig, writer: W) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_ansi(false)
        .with_target(cfg.with_targets)
        .with_span_events(span_events(cfg))
        .with_timer(local_rfc3339())
        .with_writer(writer)
}

pub(crate) fn filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

/// Local offset when the platform can report it soundly, UTC otherwise.
fn local_rfc3339() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(|e| {
        let msg = e.to_string();
        if msg.contains("SetGlobalDefaultError") || msg.contains("global default") {
            LoggerError::AlreadyInitialized
        } else {
            LoggerError::InitializationFailed(msg)
        }
    })
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_with(filter: EnvFilter) -> Result<(), LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("scribe".to_string());
    init_with(tracing_subscriber::registry().with(filter).with(layer))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_with(_filter: EnvFilter) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{LoggerFormat, logger_init};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn plain(format: LoggerFormat) -> LoggerConfig {
        LoggerConfig {
            use_color: false,
            ..LoggerConfig::new(format, "debug")
        }
    }

    fn emit_in_task_span() {
        let span = tracing::info_span!("monitor", task_id = "t-7");
        span.in_scope(|| tracing::info!("job scheduled"));
    }

    #[test]
    fn directives_are_validated() {
        assert!(filter("info").is_ok());
        assert!(filter("scribe_core=debug,axum=warn").is_ok());
        assert!(matches!(
            filter("scribe=loud"),
            Err(LoggerError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn text_events_carry_the_task_id() {
        let out = Capture::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::registry()
            .with(text_layer(&plain(LoggerFormat::Text), move || writer.clone()));
        tracing::subscriber::with_default(subscriber, emit_in_task_span);

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("monitor{"));
        assert!(lines[0].contains("t-7"));
        assert!(lines[0].contains("job scheduled"));
    }

    #[test]
    fn span_events_log_the_closed_task_span() {
        let out = Capture::default();
        let writer = out.clone();
        let cfg = plain(LoggerFormat::Text).with_span_events(true);
        let subscriber =
            tracing_subscriber::registry().with(text_layer(&cfg, move || writer.clone()));
        tracing::subscriber::with_default(subscriber, emit_in_task_span);

        let lines = out.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("t-7"));
        assert!(lines[1].contains("close"));
        assert!(lines[1].contains("time.busy"));
    }

    #[test]
    fn json_events_keep_only_the_current_span() {
        let out = Capture::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::registry()
            .with(json_layer(&plain(LoggerFormat::Json), move || writer.clone()));
        tracing::subscriber::with_default(subscriber, emit_in_task_span);

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(r#""task_id":"t-7""#));
        assert!(lines[0].contains(r#""name":"monitor""#));
        assert!(!lines[0].contains(r#""spans":"#));
    }

    #[test]
    fn second_init_is_reported() {
        let cfg = LoggerConfig::new(LoggerFormat::Text, "warn");
        // Other tests in this binary may have won the race; either way the next call must fail.
        let _ = logger_init(&cfg);
        assert!(logger_init(&cfg).is_err());
    }
}
