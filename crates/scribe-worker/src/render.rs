use std::path::Path;

use async_trait::async_trait;
use tracing::instrument;

use crate::{
    WorkerError,
    process::{command, run_checked},
};

/// Produces the two video artifacts of a job.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    /// Black-frame video carrying the source audio track.
    async fn blank_video(&self, audio: &Path, out: &Path) -> Result<(), WorkerError>;

    /// Re-encodes `video` with `captions` burned into the frames.
    async fn burn_captions(
        &self,
        video: &Path,
        captions: &Path,
        out: &Path,
    ) -> Result<(), WorkerError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    program: String,
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn blank_args(audio: &Path, out: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y",
            "-stream_loop",
            "1",
            "-f",
            "lavfi",
            "-i",
            "color=size=640x480:rate=25:color=black",
            "-i",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(audio.to_string_lossy().into_owned());
        args.extend(
            [
                "-shortest", "-map", "0:v", "-map", "1:a", "-c:v", "libx264", "-c:a", "copy",
            ]
            .into_iter()
            .map(String::from),
        );
        args.push(out.to_string_lossy().into_owned());
        args
    }

    fn burn_args(video: &Path, captions: &Path, out: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            video.to_string_lossy().into_owned(),
            "-vf".into(),
            format!("subtitles={}", captions.to_string_lossy()),
            out.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    #[instrument(level = "debug", skip(self))]
    async fn blank_video(&self, audio: &Path, out: &Path) -> Result<(), WorkerError> {
        let args = Self::blank_args(audio, out);
        run_checked(&self.program, command(&self.program, &args)).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn burn_captions(
        &self,
        video: &Path,
        captions: &Path,
        out: &Path,
    ) -> Result<(), WorkerError> {
        let args = Self::burn_args(video, captions, out);
        run_checked(&self.program, command(&self.program, &args)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_video_maps_generated_frames_and_source_audio() {
        let args = FfmpegRenderer::blank_args(Path::new("/w/a/source.mp3"), Path::new("/w/a/blank.mp4"));
        let joined = args.join(" ");

        assert!(joined.starts_with("-y -stream_loop 1 -f lavfi"));
        assert!(joined.contains("-i /w/a/source.mp3 -shortest"));
        assert!(joined.contains("-map 0:v -map 1:a"));
        assert_eq!(args.last().map(String::as_str), Some("/w/a/blank.mp4"));
    }

    #[test]
    fn burn_uses_subtitles_filter() {
        let args = FfmpegRenderer::burn_args(
            Path::new("/w/a/blank.mp4"),
            Path::new("/w/a/segments.srt"),
            Path::new("/w/a/subtitled.mp4"),
        );
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/w/a/blank.mp4",
                "-vf",
                "subtitles=/w/a/segments.srt",
                "/w/a/subtitled.mp4"
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_is_an_error() {
        let renderer = FfmpegRenderer::new("false");
        let err = renderer
            .blank_video(Path::new("a.mp3"), Path::new("b.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::NonZeroExit { .. }));
    }
}
