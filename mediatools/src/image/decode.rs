//! Image decoding

use anyhow::{Context, Result};
use imageproc::image::{guess_format, load_from_memory, DynamicImage};

use std::path::Path;

use super::heic;

pub struct Decoded {
    pub image: DynamicImage,
    pub mime_type: String,
    /// libheif applies the container's rotation while converting, so the
    /// EXIF orientation must not be applied a second time.
    pub pre_oriented: bool,
}

/// Decode an image file, routing HEIC/HEIF through an external conversion first.
pub fn decode_file(path: &Path, data: &[u8]) -> Result<Decoded> {
    if heic::is_heif(path, data) {
        let png = heic::convert_to_png(path)?;
        let image = decode(&png).context("Failed to decode converted HEIF image")?;
        return Ok(Decoded {
            image,
            mime_type: "image/heic".to_string(),
            pre_oriented: true,
        });
    }

    let mime_type = guess_format(data)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
        .to_string();

    Ok(Decoded {
        image: decode(data)?,
        mime_type,
        pre_oriented: false,
    })
}

/// Decode image from memory
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    load_from_memory(data).map_err(Into::into)
}
