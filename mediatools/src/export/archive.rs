use anyhow::{Context, Result};
use imageproc::image::DynamicImage;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use std::io::{Cursor, Write};

use super::trace::VectorTracer;
use crate::image::{RasterFormat, Rasterizer};

pub const LOGO_512: &str = "logo512.png";
pub const LOGO_192: &str = "logo192.png";
pub const FAVICON: &str = "favicon.ico";
pub const LOGO_SVG: &str = "logo.svg";

const FAVICON_SIZE: u32 = 64;
const SVG_SIZE: u32 = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub path: String,
    pub data: Vec<u8>,
}

/// Packs named entries into a single archive blob
pub trait Archiver {
    fn archive(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn archive(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        // PNG and ICO payloads are already compressed
        let options_stored =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let options_deflated =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in entries {
            let options = if entry.path.ends_with(".svg") {
                options_deflated
            } else {
                options_stored
            };
            zip.start_file(entry.path.as_str(), options)
                .with_context(|| format!("Failed to add {} to archive", entry.path))?;
            zip.write_all(&entry.data)?;
        }

        let cursor = zip.finish().context("Failed to finish zip archive")?;

        log::debug!("Built zip with {} entries", entries.len());

        Ok(cursor.into_inner())
    }
}

/// The web-app icon set for one image: two square PNG logos, a favicon and a
/// traced SVG, optionally nested under `folder/`.
pub fn icon_set(
    image: &DynamicImage,
    folder: Option<&str>,
    rasterizer: &dyn Rasterizer,
    tracer: &dyn VectorTracer,
) -> Result<Vec<ArchiveEntry>> {
    let path = |name: &str| match folder {
        Some(folder) => format!("{folder}/{name}"),
        None => name.to_string(),
    };

    Ok(vec![
        ArchiveEntry {
            path: path(LOGO_512),
            data: rasterizer.render_square(image, 512, RasterFormat::png())?,
        },
        ArchiveEntry {
            path: path(LOGO_192),
            data: rasterizer.render_square(image, 192, RasterFormat::png())?,
        },
        ArchiveEntry {
            path: path(FAVICON),
            data: rasterizer.render_square(image, FAVICON_SIZE, RasterFormat::Ico)?,
        },
        ArchiveEntry {
            path: path(LOGO_SVG),
            data: tracer.trace(image, SVG_SIZE, SVG_SIZE)?.into_bytes(),
        },
    ])
}
