pub mod config;
pub mod dimensions;
pub mod export;
pub mod image;
pub mod session;
pub mod video;

// Re-export commonly used types
pub use config::AppConfig;
pub use dimensions::{DimensionError, DimensionState};
pub use export::{ExportFormat, ExportScope, OutputFile};
pub use crate::image::LoadedImage;
pub use session::Session;
pub use video::{is_ffmpeg_available, JobState, QualityPreset, ResolutionPreset};
