use std::{
    path::{Component, Path, PathBuf},
    time::Duration,
};

use crate::error::CoreError;

/// Timing of one monitor's polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Maximum time between the worker's `Running` acknowledgment and a terminal reply.
    pub watchdog: Duration,
    /// Maximum time between dispatch and the `Running` acknowledgment.
    ///
    /// `None` waits for the acknowledgment indefinitely, so a job queued behind
    /// long transcriptions on a busy worker is never timed out.
    pub ack_timeout: Option<Duration>,
    /// Upper bound of a single wait on the channels before liveness and elapsed time are re-checked.
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watchdog: Duration::from_secs(300),
            ack_timeout: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Root under which every submission's directory lives.
    pub workdir: PathBuf,
    /// Audio file name expected inside a submission directory.
    pub source_file: String,
    /// Ledger snapshot file name, relative to `workdir`.
    pub ledger_file: String,
    /// Maximum number of simultaneously active monitors.
    pub admission_capacity: usize,
    pub monitor: MonitorConfig,
    /// How long shutdown waits for monitors to wind down before persisting.
    pub drain_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            source_file: "source.mp3".to_string(),
            ledger_file: "ledger.json".to_string(),
            admission_capacity: 2048,
            monitor: MonitorConfig::default(),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl GatewayConfig {
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.workdir.is_dir() {
            return Err(CoreError::InvalidConfig(format!(
                "workdir {} is not a directory",
                self.workdir.display()
            )));
        }
        if self.source_file.trim().is_empty() {
            return Err(CoreError::InvalidConfig("source_file is empty".into()));
        }
        if self.ledger_file.trim().is_empty() {
            return Err(CoreError::InvalidConfig("ledger_file is empty".into()));
        }
        if self.admission_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "admission_capacity must be positive".into(),
            ));
        }
        if self.monitor.watchdog.is_zero() || self.monitor.poll_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "watchdog and poll_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.workdir.join(&self.ledger_file)
    }

    /// Resolve the source audio path for a submission directory.
    ///
    /// `dirname` must stay inside `workdir`: absolute paths and `..` are rejected.
    pub fn source_path(&self, dirname: &str) -> Result<PathBuf, CoreError> {
        let rel = Path::new(dirname);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if dirname.trim().is_empty() || escapes {
            return Err(CoreError::InvalidDirname(dirname.to_string()));
        }
        Ok(self.workdir.join(rel).join(&self.source_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_limits() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.admission_capacity, 2048);
        assert_eq!(cfg.monitor.watchdog, Duration::from_secs(300));
        assert_eq!(cfg.monitor.ack_timeout, None);
        assert_eq!(cfg.source_file, "source.mp3");
    }

    #[test]
    fn source_path_joins_workdir_dirname_and_file() {
        let cfg = GatewayConfig::default().with_workdir("/srv/audio");
        assert_eq!(
            cfg.source_path("job-1").unwrap(),
            PathBuf::from("/srv/audio/job-1/source.mp3")
        );
    }

    #[test]
    fn source_path_rejects_escapes() {
        let cfg = GatewayConfig::default().with_workdir("/srv/audio");
        assert!(matches!(
            cfg.source_path("../etc"),
            Err(CoreError::InvalidDirname(_))
        ));
        assert!(matches!(
            cfg.source_path("/etc"),
            Err(CoreError::InvalidDirname(_))
        ));
        assert!(matches!(
            cfg.source_path("  "),
            Err(CoreError::InvalidDirname(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = GatewayConfig::default().with_workdir(dir.path());
        assert!(cfg.validate().is_ok());

        cfg.admission_capacity = 0;
        assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));
    }
}
