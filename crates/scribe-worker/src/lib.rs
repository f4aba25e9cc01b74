//! Transcription worker: a single serial loop around an expensive, resident engine.
//!
//! One job at a time is taken from the shared inbox, acknowledged with `Running`,
//! transcribed, turned into artifacts next to the source audio, and answered with
//! `Completed` or `Failed`. A failing job never stops the loop.

mod error;
pub use error::WorkerError;

pub mod caption;
pub use caption::{format_timestamp, srt_timestamp, to_srt};

mod engine;
pub use engine::{CommandEngine, TranscriptionEngine};

mod render;
pub use render::{FfmpegRenderer, Renderer};

mod artifacts;
pub use artifacts::ArtifactPaths;

mod process;

mod config;
pub use config::WorkerConfig;

mod worker;
pub use worker::{Worker, WorkerReport};
