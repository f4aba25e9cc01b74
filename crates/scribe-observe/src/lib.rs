//! Process-wide logging setup shared by the gateway and worker binaries.
mod logger;
pub use logger::*;
