//! Image intake: decode, orientation correction and descriptive metadata

mod decode;
mod encode;
mod heic;
mod metadata;
mod orientation;

// Re-export public API
pub use encode::{
    compress_to_ico, compress_to_jpeg, compress_to_png, fit_within, ico_dimensions,
    ImageRasterizer, PngCompression, RasterFormat, Rasterizer, ICO_MAX_DIMENSION,
};
pub use heic::is_heif_convert_available;
pub use metadata::{read_exif, ExifSummary};
pub use orientation::{fix_orientation, Orientation};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use imageproc::image::DynamicImage;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const UNKNOWN_DEVICE: &str = "Unknown device";

/// A decoded, upright image together with what the user sees about it.
///
/// Built once per input file and never mutated afterwards; the pixel buffer is
/// shared so sessions and exports can hold it cheaply.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pixels: Arc<DynamicImage>,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub file_name: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub device_label: String,
    pub captured_at: Option<NaiveDateTime>,
    /// EXIF orientation that was applied while loading
    pub orientation: Orientation,
}

impl LoadedImage {
    /// Normalize an already decoded raster. `orientation_tag` is the raw EXIF
    /// value; anything outside 1-8 is treated as upright.
    pub fn from_decoded(
        image: DynamicImage,
        orientation_tag: u32,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        byte_size: u64,
    ) -> Self {
        let orientation = Orientation::from_exif(orientation_tag);
        let image = orientation.apply(image);
        let (width, height) = (image.width(), image.height());

        LoadedImage {
            pixels: Arc::new(image),
            width,
            height,
            aspect_ratio: aspect_ratio(width, height),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            byte_size,
            last_modified: None,
            device_label: UNKNOWN_DEVICE.to_string(),
            captured_at: None,
            orientation,
        }
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    /// File name without its extension, used as the default export base name
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }

    /// Human readable size, e.g. "1.4 MB"
    pub fn display_size(&self) -> String {
        const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
        let mut size = self.byte_size as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} B", self.byte_size)
        } else {
            format!("{size:.1} {}", UNITS[unit])
        }
    }
}

/// width / height, with a zero height reported as a ratio of 1.
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    if height == 0 {
        1.0
    } else {
        width as f64 / height as f64
    }
}

/// Load and normalize a single image file.
pub fn load(path: &Path) -> Result<LoadedImage> {
    let data = std::fs::read(path).context(format!("Failed to read {}", path.display()))?;
    let fs_meta = std::fs::metadata(path).ok();

    let decoded = decode::decode_file(path, &data)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let exif = read_exif(&data);
    let orientation_tag = if decoded.pre_oriented {
        1
    } else {
        exif.orientation
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut image = LoadedImage::from_decoded(
        decoded.image,
        orientation_tag,
        file_name,
        decoded.mime_type,
        data.len() as u64,
    );
    image.last_modified = fs_meta
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from);
    image.device_label = exif
        .device_label()
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());
    image.captured_at = exif.captured_at;

    log::debug!(
        "Loaded {} ({}x{}, {}, {})",
        image.file_name,
        image.width,
        image.height,
        image.mime_type,
        image.device_label
    );

    Ok(image)
}

/// Load a batch of files in parallel, preserving input order.
///
/// Files that fail to read or decode are logged and left out; they never abort
/// the rest of the batch.
pub fn load_batch(paths: &[PathBuf]) -> Vec<LoadedImage> {
    log::info!("Loading {} images", paths.len());

    let images: Vec<LoadedImage> = paths
        .par_iter()
        .map(|path| {
            load(path)
                .map_err(|e| log::warn!("Skipping {}: {:#}", path.display(), e))
                .ok()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    log::debug!("Loaded {} of {} images", images.len(), paths.len());

    images
}
