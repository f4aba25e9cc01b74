use serde::{Deserialize, Serialize};

/// One time-coded chunk of recognised speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Zero-based position in the transcription.
    pub id: u32,
    /// Start offset in seconds.
    pub start: f64,
    /// End offset in seconds.
    pub end: f64,
    pub text: String,
}

/// Output of the transcription engine for one audio file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcription {
    /// Full recognised text.
    pub text: String,
    /// Segments ordered by `id`.
    #[serde(default)]
    pub segments: Vec<Segment>,
}
