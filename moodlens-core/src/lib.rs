pub mod client;
pub mod detection;
pub mod display;
pub mod pipeline;
pub mod rendering;
pub mod runtime;
pub mod video;

// Re-export the top-level error type so callers only need `moodlens_core::Error`
pub use anyhow::Error;
pub use anyhow::Result;
