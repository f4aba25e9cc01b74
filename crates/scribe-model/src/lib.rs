mod task_id;
pub use task_id::TaskId;

mod task_status;
pub use task_status::{TaskStatus, UnknownStatus};

mod transcription;
pub use transcription::{Segment, Transcription};

mod params;
pub use params::{DecodeParams, DecodeTask};
