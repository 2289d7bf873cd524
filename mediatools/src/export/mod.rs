//! Export dispatch: raster re-encode, vector trace, PDF and ZIP packaging

pub mod archive;
pub mod pdf;
pub mod trace;

pub use archive::{icon_set, ArchiveEntry, Archiver, ZipArchiver};
pub use pdf::{DocumentComposer, PdfComposer};
pub use trace::{ContourTracer, VectorTracer};

use anyhow::Result;
use imageproc::image::DynamicImage;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter};

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::image::{ImageRasterizer, LoadedImage, PngCompression, RasterFormat, Rasterizer};
use crate::session::Session;

pub const DEFAULT_JPEG_QUALITY: u8 = 92;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumCount, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpg,
    Svg,
    Ico,
    Pdf,
    Zip,
}

impl ExportFormat {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
            ExportFormat::Svg => "svg",
            ExportFormat::Ico => "ico",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Zip => "zip",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpg => "image/jpeg",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Ico => "image/x-icon",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Zip => "application/zip",
        }
    }

    /// PDF and ZIP fold every image into one output file.
    pub fn is_bundle(self) -> bool {
        matches!(self, ExportFormat::Pdf | ExportFormat::Zip)
    }
}

#[derive(Debug)]
pub struct ParseError(String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("Invalid export format: ")?;
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

impl FromStr for ExportFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpg),
            "svg" => Ok(ExportFormat::Svg),
            "ico" => Ok(ExportFormat::Ico),
            "pdf" => Ok(ExportFormat::Pdf),
            "zip" => Ok(ExportFormat::Zip),
            _ => Err(ParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportScope {
    Current,
    All,
}

/// One finished export, ready to be written or handed to the user
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl OutputFile {
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.data)?;
        Ok(path)
    }
}

/// `<base>.<ext>` for a single output, `<base>-1..N.<ext>` otherwise.
pub fn output_names(base: &str, extension: &str, count: usize) -> Vec<String> {
    match count {
        0 => Vec::new(),
        1 => vec![format!("{base}.{extension}")],
        n => (1..=n).map(|i| format!("{base}-{i}.{extension}")).collect(),
    }
}

/// Export settings beyond what the session holds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub scope: ExportScope,
    pub jpeg_quality: u8,
    pub png_compression: PngCompression,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            scope: ExportScope::Current,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            png_compression: PngCompression::Default,
        }
    }

    pub fn with_scope(mut self, scope: ExportScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Routes images to the capability backends that produce each format.
pub struct Exporter {
    rasterizer: Box<dyn Rasterizer + Send + Sync>,
    tracer: Box<dyn VectorTracer + Send + Sync>,
    composer: Box<dyn DocumentComposer + Send + Sync>,
    archiver: Box<dyn Archiver + Send + Sync>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self {
            rasterizer: Box::new(ImageRasterizer),
            tracer: Box::new(ContourTracer),
            composer: Box::new(PdfComposer::default()),
            archiver: Box::new(ZipArchiver),
        }
    }
}

impl Exporter {
    pub fn new(
        rasterizer: Box<dyn Rasterizer + Send + Sync>,
        tracer: Box<dyn VectorTracer + Send + Sync>,
        composer: Box<dyn DocumentComposer + Send + Sync>,
        archiver: Box<dyn Archiver + Send + Sync>,
    ) -> Self {
        Self {
            rasterizer,
            tracer,
            composer,
            archiver,
        }
    }

    /// Export the session's current image, or all of them, at the session's
    /// target dimensions.
    pub fn export(&self, session: &Session, options: &ExportOptions) -> Result<Vec<OutputFile>> {
        let Some(current) = session.current() else {
            anyhow::bail!("No image loaded");
        };

        let dims = session.dimensions();
        let (target_w, target_h) = dims.dimensions();
        let jobs: Vec<(&LoadedImage, (u32, u32))> = match options.scope {
            ExportScope::Current => vec![(current, (target_w, target_h))],
            ExportScope::All => session
                .images()
                .iter()
                .map(|image| {
                    let size = if dims.is_locked() {
                        (target_w, locked_height(target_w, image.aspect_ratio))
                    } else {
                        (target_w, target_h)
                    };
                    (image, size)
                })
                .collect(),
        };

        log::info!(
            "Exporting {} image(s) as {:?} ({}x{})",
            jobs.len(),
            options.format,
            target_w,
            target_h
        );

        self.export_images(&jobs, session.base_name(), options)
    }

    /// Export explicit (image, target size) pairs.
    pub fn export_images(
        &self,
        jobs: &[(&LoadedImage, (u32, u32))],
        base: &str,
        options: &ExportOptions,
    ) -> Result<Vec<OutputFile>> {
        if jobs.is_empty() {
            anyhow::bail!("No images to export");
        }

        let format = options.format;
        let mime_type = format.mime_type();

        match format {
            ExportFormat::Png | ExportFormat::Jpg | ExportFormat::Ico | ExportFormat::Svg => {
                let names = output_names(base, format.extension(), jobs.len());
                let mut files = Vec::with_capacity(jobs.len());
                for ((image, (w, h)), file_name) in jobs.iter().zip(names) {
                    let data = self.render_single(image.pixels(), *w, *h, options)?;
                    log::debug!("Exported {} -> {file_name}", image.file_name);
                    files.push(OutputFile {
                        file_name,
                        mime_type,
                        data,
                    });
                }
                Ok(files)
            }
            ExportFormat::Pdf => {
                let resized = jobs
                    .iter()
                    .map(|(image, (w, h))| self.rasterizer.resize(image.pixels(), *w, *h))
                    .collect::<Result<Vec<DynamicImage>>>()?;
                let data = self.composer.compose(base, &resized)?;
                Ok(vec![OutputFile {
                    file_name: format!("{base}.pdf"),
                    mime_type,
                    data,
                }])
            }
            ExportFormat::Zip => {
                let nested = jobs.len() > 1;
                let mut entries = Vec::new();
                for (i, (image, _)) in jobs.iter().enumerate() {
                    let folder = nested.then(|| format!("{base}-{}", i + 1));
                    entries.extend(icon_set(
                        image.pixels(),
                        folder.as_deref(),
                        self.rasterizer.as_ref(),
                        self.tracer.as_ref(),
                    )?);
                }
                let data = self.archiver.archive(&entries)?;
                Ok(vec![OutputFile {
                    file_name: format!("{base}.zip"),
                    mime_type,
                    data,
                }])
            }
        }
    }

    fn render_single(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        options: &ExportOptions,
    ) -> Result<Vec<u8>> {
        let raster = match options.format {
            ExportFormat::Png => RasterFormat::Png {
                compression: options.png_compression,
            },
            ExportFormat::Jpg => RasterFormat::Jpeg {
                quality: options.jpeg_quality,
            },
            ExportFormat::Ico => RasterFormat::Ico,
            ExportFormat::Svg => {
                return Ok(self.tracer.trace(image, width, height)?.into_bytes());
            }
            ExportFormat::Pdf | ExportFormat::Zip => {
                anyhow::bail!("{:?} is not a single-image format", options.format)
            }
        };
        self.rasterizer.render(image, width, height, raster)
    }
}

fn locked_height(width: u32, ratio: f64) -> u32 {
    if ratio <= 0.0 {
        return width;
    }
    ((width as f64 / ratio).round() as u32).max(1)
}
