use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use scribe_core::{GatewayConfig, MonitorConfig};
use scribe_model::DecodeParams;
use scribe_observe::{LoggerConfig, LoggerFormat};
use scribe_transport::TransportConfig;
use scribe_worker::WorkerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio transcription gateway and worker", long_about = None)]
pub struct Cli {
    /// Log filter directive
    #[arg(long, env = "SCRIBE_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log output: text, json or journald
    #[arg(long, env = "SCRIBE_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LoggerFormat,

    /// Log every task span as it closes, with its task id and timings
    #[arg(long, env = "SCRIBE_LOG_SPANS", global = true)]
    pub log_spans: bool,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// HTTP front end; dispatches jobs to a remote worker
    Gateway(GatewayArgs),
    /// Transcription worker serving the job and control endpoints
    Worker(WorkerArgs),
    /// Gateway and worker in one process over an in-memory bus
    Standalone(StandaloneArgs),
}

#[derive(Args, Debug)]
pub struct GatewayArgs {
    #[command(flatten)]
    pub server: ServerArgs,
    #[command(flatten)]
    pub transport: TransportArgs,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
    #[command(flatten)]
    pub transport: TransportArgs,
}

#[derive(Args, Debug)]
pub struct StandaloneArgs {
    #[command(flatten)]
    pub server: ServerArgs,
    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Directory holding one sub-directory per submission
    #[arg(long, env = "SCRIBE_WORKDIR", default_value = ".")]
    pub workdir: PathBuf,

    /// HTTP listen address
    #[arg(long, env = "SCRIBE_HTTP_ADDR", default_value = "127.0.0.1:8000")]
    pub http_addr: SocketAddr,

    /// Maximum number of tasks monitored at once
    #[arg(long, env = "SCRIBE_ADMISSION_CAPACITY", default_value_t = 2048)]
    pub admission_capacity: usize,

    /// Seconds a running task may go without a result before it is marked timed out
    #[arg(long, env = "SCRIBE_WATCHDOG_SECS", default_value_t = 300)]
    pub watchdog_secs: u64,

    /// Seconds a dispatched task may wait for the worker to pick it up; unbounded when omitted
    #[arg(long, env = "SCRIBE_ACK_TIMEOUT_SECS")]
    pub ack_timeout_secs: Option<u64>,

    /// Do not mount GET /metrics
    #[arg(long, env = "SCRIBE_NO_METRICS")]
    pub no_metrics: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TransportArgs {
    /// Job channel address (worker listens, gateway dials)
    #[arg(long, env = "SCRIBE_JOB_ADDR", default_value = "127.0.0.1:5555")]
    pub job_addr: String,

    /// Control channel address (worker publishes, gateway subscribes)
    #[arg(long, env = "SCRIBE_CONTROL_ADDR", default_value = "127.0.0.1:5556")]
    pub control_addr: String,
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Recognizer executable printing a JSON transcription on stdout
    #[arg(long, env = "SCRIBE_ENGINE", default_value = "whisper-json")]
    pub engine: String,

    /// Extra argument passed to the recognizer before the decode options (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// ffmpeg executable
    #[arg(long, env = "SCRIBE_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// Spoken language; detected by the engine when omitted
    #[arg(long, env = "SCRIBE_LANGUAGE")]
    pub language: Option<String>,

    /// Inbox poll interval in milliseconds
    #[arg(long, env = "SCRIBE_POLL_MS", default_value_t = 1000)]
    pub poll_ms: u64,
}

impl Cli {
    pub fn logger(&self) -> LoggerConfig {
        LoggerConfig::new(self.log_format, self.log_level.clone()).with_span_events(self.log_spans)
    }
}

impl ServerArgs {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            admission_capacity: self.admission_capacity,
            monitor: MonitorConfig {
                watchdog: Duration::from_secs(self.watchdog_secs),
                ack_timeout: self.ack_timeout_secs.map(Duration::from_secs),
                ..MonitorConfig::default()
            },
            ..GatewayConfig::default().with_workdir(&self.workdir)
        }
    }
}

impl TransportArgs {
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            job_addr: self.job_addr.clone(),
            control_addr: self.control_addr.clone(),
        }
    }
}

impl EngineArgs {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            params: DecodeParams {
                language: self.language.clone(),
                ..DecodeParams::default()
            },
            ..WorkerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_defaults() {
        let cli = Cli::try_parse_from(["scribe-agentd", "gateway"]).unwrap();
        let Mode::Gateway(args) = cli.mode else {
            panic!("expected gateway mode");
        };
        let cfg = args.server.gateway_config();
        assert_eq!(cfg.admission_capacity, 2048);
        assert_eq!(cfg.monitor.watchdog, Duration::from_secs(300));
        assert_eq!(cfg.monitor.ack_timeout, None);
        assert_eq!(args.transport.transport_config(), TransportConfig::default());
        assert_eq!(cli.log_format, LoggerFormat::Text);
    }

    #[test]
    fn ack_timeout_is_opt_in() {
        let cli = Cli::try_parse_from([
            "scribe-agentd",
            "gateway",
            "--watchdog-secs",
            "60",
            "--ack-timeout-secs",
            "900",
        ])
        .unwrap();
        let Mode::Gateway(args) = cli.mode else {
            panic!("expected gateway mode");
        };
        let monitor = args.server.gateway_config().monitor;
        assert_eq!(monitor.watchdog, Duration::from_secs(60));
        assert_eq!(monitor.ack_timeout, Some(Duration::from_secs(900)));
    }

    #[test]
    fn worker_flags() {
        let cli = Cli::try_parse_from([
            "scribe-agentd",
            "--log-format",
            "json",
            "worker",
            "--engine",
            "/opt/asr",
            "--engine-arg",
            "--model",
            "--engine-arg",
            "small",
            "--language",
            "en",
            "--job-addr",
            "0.0.0.0:7000",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LoggerFormat::Json);
        assert!(!cli.logger().span_events);

        let Mode::Worker(args) = cli.mode else {
            panic!("expected worker mode");
        };
        assert_eq!(args.engine.engine_args, vec!["--model", "small"]);
        assert_eq!(args.transport.job_addr, "0.0.0.0:7000");
        let cfg = args.engine.worker_config();
        assert_eq!(cfg.params.language.as_deref(), Some("en"));
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn log_spans_reaches_logger_config() {
        let cli = Cli::try_parse_from(["scribe-agentd", "standalone", "--log-spans"]).unwrap();
        assert!(cli.logger().span_events);
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["scribe-agentd", "--log-format", "xml", "gateway"]).is_err());
    }
}
