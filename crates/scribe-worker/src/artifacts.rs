use std::path::{Path, PathBuf};

use scribe_model::{Segment, Transcription};
use serde::Serialize;
use tracing::debug;

use crate::{WorkerError, caption::to_srt};

pub const TEXT_FILE: &str = "data.txt";
pub const CAPTIONS_FILE: &str = "segments.srt";
pub const RESULT_FILE: &str = "transcription.json";
pub const BLANK_VIDEO_FILE: &str = "blank.mp4";
pub const CAPTIONED_VIDEO_FILE: &str = "subtitled.mp4";

/// Output locations for one job, all beside the source audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub text: PathBuf,
    pub captions: PathBuf,
    pub result: PathBuf,
    pub blank_video: PathBuf,
    pub captioned_video: PathBuf,
}

#[derive(Serialize)]
struct ResultDocument<'a> {
    text: &'a str,
    srt_segments: &'a [Segment],
}

impl ArtifactPaths {
    pub fn beside(audio: &Path) -> Result<Self, WorkerError> {
        let (Some(dir), Some(_)) = (audio.parent(), audio.file_name()) else {
            return Err(WorkerError::InvalidPath(audio.to_path_buf()));
        };

        Ok(Self {
            text: dir.join(TEXT_FILE),
            captions: dir.join(CAPTIONS_FILE),
            result: dir.join(RESULT_FILE),
            blank_video: dir.join(BLANK_VIDEO_FILE),
            captioned_video: dir.join(CAPTIONED_VIDEO_FILE),
        })
    }

    /// Writes the text, caption and result documents.
    pub async fn write_documents(&self, transcription: &Transcription) -> Result<(), WorkerError> {
        let doc = ResultDocument {
            text: &transcription.text,
            srt_segments: &transcription.segments,
        };
        tokio::fs::write(&self.result, serde_json::to_vec(&doc)?).await?;
        tokio::fs::write(&self.text, transcription.text.as_bytes()).await?;
        tokio::fs::write(&self.captions, to_srt(&transcription.segments)).await?;

        debug!(dir = ?self.text.parent(), "documents written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_beside_audio() {
        let paths = ArtifactPaths::beside(Path::new("/w/job/source.mp3")).unwrap();
        assert_eq!(paths.text, Path::new("/w/job/data.txt"));
        assert_eq!(paths.captions, Path::new("/w/job/segments.srt"));
        assert_eq!(paths.result, Path::new("/w/job/transcription.json"));
        assert_eq!(paths.blank_video, Path::new("/w/job/blank.mp4"));
        assert_eq!(paths.captioned_video, Path::new("/w/job/subtitled.mp4"));
    }

    #[test]
    fn root_is_not_an_audio_path() {
        assert!(matches!(
            ArtifactPaths::beside(Path::new("/")),
            Err(WorkerError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn writes_all_documents() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::beside(&dir.path().join("source.mp3")).unwrap();
        let transcription = Transcription {
            text: "hello world".into(),
            segments: vec![Segment {
                id: 0,
                start: 0.0,
                end: 2.0,
                text: "hello world".into(),
            }],
        };

        paths.write_documents(&transcription).await.unwrap();

        let text = tokio::fs::read_to_string(&paths.text).await.unwrap();
        assert_eq!(text, "hello world");

        let srt = tokio::fs::read_to_string(&paths.captions).await.unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,000\nhello world\n"));

        let raw = tokio::fs::read(&paths.result).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["text"], "hello world");
        assert_eq!(json["srt_segments"][0]["end"], 2.0);
    }
}
