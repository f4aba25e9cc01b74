use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeTask {
    #[default]
    Transcribe,
    Translate,
}

/// Per-job decoding parameters forwarded to the transcription engine.
///
/// Model selection (name, device, cache directory) is a property of the engine
/// instance and is not carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeParams {
    /// Spoken language hint; `None` lets the engine detect it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub task: DecodeTask,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_of: Option<u32>,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            language: None,
            task: DecodeTask::Transcribe,
            temperature: 0.0,
            beam_size: Some(5),
            best_of: Some(5),
        }
    }
}

impl DecodeParams {
    /// Render as command-line flags for an external engine program.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(language) = &self.language {
            args.push("--language".to_string());
            args.push(language.clone());
        }
        args.push("--task".to_string());
        args.push(
            match self.task {
                DecodeTask::Transcribe => "transcribe",
                DecodeTask::Translate => "translate",
            }
            .to_string(),
        );
        args.push("--temperature".to_string());
        args.push(self.temperature.to_string());
        if let Some(beam_size) = self.beam_size {
            args.push("--beam_size".to_string());
            args.push(beam_size.to_string());
        }
        if let Some(best_of) = self.best_of {
            args.push("--best_of".to_string());
            args.push(best_of.to_string());
        }
        args
    }
}
