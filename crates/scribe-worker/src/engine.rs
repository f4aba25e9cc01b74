use std::path::Path;

use async_trait::async_trait;
use scribe_model::{DecodeParams, Transcription};
use tracing::{debug, instrument};

use crate::{
    WorkerError,
    process::{command, run_checked},
};

/// Speech-to-text backend used by the worker.
///
/// Implementations are expected to be loaded once and reused for every job.
/// CPU-bound in-process engines should move the work off the runtime
/// (`tokio::task::spawn_blocking`); the worker awaits one call at a time.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn transcribe(
        &self,
        audio: &Path,
        params: &DecodeParams,
    ) -> Result<Transcription, WorkerError>;
}

/// Runs an external recognizer: `program <args..> <decode args..> <audio>`.
///
/// The process must print one JSON document `{"text": .., "segments": [..]}` on stdout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn argv(&self, audio: &Path, params: &DecodeParams) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.extend(params.to_args());
        argv.push(audio.to_string_lossy().into_owned());
        argv
    }
}

#[async_trait]
impl TranscriptionEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(level = "debug", skip(self, params), fields(engine = %self.program))]
    async fn transcribe(
        &self,
        audio: &Path,
        params: &DecodeParams,
    ) -> Result<Transcription, WorkerError> {
        let argv = self.argv(audio, params);
        debug!(?argv, "running engine");

        let stdout = run_checked(&self.program, command(&self.program, &argv)).await?;
        serde_json::from_slice(&stdout).map_err(WorkerError::EngineOutput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_ends_with_audio_path() {
        let engine = CommandEngine::new("whisper-cli").with_args(["--model", "base"]);
        let argv = engine.argv(Path::new("/data/a/source.mp3"), &DecodeParams::default());

        assert_eq!(&argv[..2], &["--model", "base"]);
        assert_eq!(argv.last().map(String::as_str), Some("/data/a/source.mp3"));
        assert!(argv.iter().any(|a| a == "--beam_size"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_engine_stdout() {
        let script = r#"printf '{"text":"hi","segments":[{"id":0,"start":0.0,"end":1.0,"text":"hi"}]}'; :"#;
        let engine = CommandEngine::new("sh").with_args(["-c", script, "engine"]);

        let out = engine
            .transcribe(Path::new("x.mp3"), &DecodeParams::default())
            .await
            .unwrap();
        assert_eq!(out.text, "hi");
        assert_eq!(out.segments.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbage_stdout_is_engine_output_error() {
        let engine = CommandEngine::new("sh").with_args(["-c", "echo not-json", "engine"]);
        let err = engine
            .transcribe(Path::new("x.mp3"), &DecodeParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::EngineOutput(_)));
    }
}
