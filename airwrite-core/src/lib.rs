pub mod config;
pub mod contour;
pub mod locator;
pub mod persistence;
pub mod pipeline;
pub mod rendering;
pub mod segmentation;
pub mod trajectory;
pub mod video;

// Re-export the top-level pipeline error type so callers only need `airwrite_core::Error`
pub use anyhow::Error;
pub use anyhow::Result;

pub use config::PipelineConfig;
pub use pipeline::{FrameReport, Pipeline};
