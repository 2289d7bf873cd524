//! Resizing and raster encoding: PNG, JPEG, ICO

use anyhow::{Context, Result};
use fast_image_resize as fr;
use fr::images::Image as FrImage;
use imageproc::image::codecs::ico::IcoEncoder;
use imageproc::image::codecs::jpeg::JpegEncoder;
use imageproc::image::codecs::png::{CompressionType, FilterType, PngEncoder};
use imageproc::image::{imageops, DynamicImage, ExtendedColorType, ImageEncoder, Rgba, RgbaImage};

/// ICO entries store each dimension in a single byte (0 meaning 256)
pub const ICO_MAX_DIMENSION: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RasterFormat {
    Png { compression: PngCompression },
    Jpeg { quality: u8 },
    Ico,
}

impl RasterFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::Png { .. } => "png",
            RasterFormat::Jpeg { .. } => "jpg",
            RasterFormat::Ico => "ico",
        }
    }

    pub fn png() -> Self {
        RasterFormat::Png {
            compression: PngCompression::Default,
        }
    }
}

/// Pixel-level backend: scaling and re-encoding a decoded raster
pub trait Rasterizer {
    fn resize(&self, img: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage>;

    fn encode(&self, img: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>>;

    fn render(
        &self,
        img: &DynamicImage,
        width: u32,
        height: u32,
        format: RasterFormat,
    ) -> Result<Vec<u8>> {
        let (width, height) = match format {
            RasterFormat::Ico => ico_dimensions(width, height),
            _ => (width, height),
        };
        let resized = self.resize(img, width, height)?;
        self.encode(&resized, format)
    }

    /// Fit `img` inside a `size`x`size` transparent square, centered.
    fn render_square(&self, img: &DynamicImage, size: u32, format: RasterFormat) -> Result<Vec<u8>> {
        let (fit_w, fit_h) = fit_within(img.width(), img.height(), size);
        let resized = self.resize(img, fit_w, fit_h)?.to_rgba8();

        let mut canvas = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 0]));
        let x = (size - fit_w) / 2;
        let y = (size - fit_h) / 2;
        imageops::overlay(&mut canvas, &resized, x.into(), y.into());

        self.encode(&DynamicImage::ImageRgba8(canvas), format)
    }
}

/// Default backend built on `image` codecs and `fast_image_resize`
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRasterizer;

impl Rasterizer for ImageRasterizer {
    fn resize(&self, img: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
        if width == 0 || height == 0 {
            anyhow::bail!("Invalid target dimensions {width}x{height}");
        }

        let rgba = img.to_rgba8();
        let (src_width, src_height) = rgba.dimensions();
        if (src_width, src_height) == (width, height) {
            return Ok(DynamicImage::ImageRgba8(rgba));
        }

        // Downscaling: Lanczos3 preserves detail, upscaling: CatmullRom is smoother
        let algorithm = if width < src_width || height < src_height {
            fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3)
        } else {
            fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom)
        };

        let src_image =
            FrImage::from_vec_u8(src_width, src_height, rgba.into_raw(), fr::PixelType::U8x4)
                .context("Failed to wrap source pixels for resizing")?;
        let mut dst_image = FrImage::new(width, height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        resizer
            .resize(
                &src_image,
                &mut dst_image,
                Some(&fr::ResizeOptions::new().resize_alg(algorithm)),
            )
            .context("Failed to resize image")?;

        let resized = RgbaImage::from_raw(width, height, dst_image.into_vec())
            .context("Resized buffer does not match target dimensions")?;

        log::trace!("Resized {src_width}x{src_height} -> {width}x{height}");

        Ok(DynamicImage::ImageRgba8(resized))
    }

    fn encode(&self, img: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(img.width() as usize * img.height() as usize);

        match format {
            RasterFormat::Png { compression } => compress_to_png(img, &mut buffer, compression)?,
            RasterFormat::Jpeg { quality } => compress_to_jpeg(img, &mut buffer, quality)?,
            RasterFormat::Ico => compress_to_ico(img, &mut buffer)?,
        }

        Ok(buffer)
    }
}

/// Compress an image to PNG format with the specified compression level
pub fn compress_to_png<W>(
    img: &DynamicImage,
    writer: &mut W,
    compression: PngCompression,
) -> Result<()>
where
    W: std::io::Write,
{
    let compression_type = match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    };

    let encoder = PngEncoder::new_with_quality(writer, compression_type, FilterType::Adaptive);

    encoder
        .write_image(
            img.as_bytes(),
            img.width(),
            img.height(),
            img.color().into(),
        )
        .with_context(|| "Failed to compress image to PNG")?;

    Ok(())
}

/// Compress an image to JPEG format with the specified quality. Alpha is dropped.
pub fn compress_to_jpeg<W>(img: &DynamicImage, writer: &mut W, quality: u8) -> Result<()>
where
    W: std::io::Write,
{
    let rgb = img.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));

    encoder
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .with_context(|| "Failed to compress image to JPEG")?;

    Ok(())
}

/// Compress an image to a single-entry ICO
pub fn compress_to_ico<W>(img: &DynamicImage, writer: &mut W) -> Result<()>
where
    W: std::io::Write,
{
    if img.width() > ICO_MAX_DIMENSION || img.height() > ICO_MAX_DIMENSION {
        anyhow::bail!(
            "ICO images are limited to {ICO_MAX_DIMENSION}x{ICO_MAX_DIMENSION}, got {}x{}",
            img.width(),
            img.height()
        );
    }

    let rgba = img.to_rgba8();
    IcoEncoder::new(writer)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            ExtendedColorType::Rgba8,
        )
        .with_context(|| "Failed to compress image to ICO")?;

    Ok(())
}

/// Shrink dimensions to the ICO limit, keeping the aspect ratio.
pub fn ico_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width <= ICO_MAX_DIMENSION && height <= ICO_MAX_DIMENSION {
        return (width, height);
    }
    fit_within(width, height, ICO_MAX_DIMENSION)
}

/// Largest size with the same aspect ratio that fits in a `bound` square.
pub fn fit_within(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (bound, bound);
    }
    let ratio = (bound as f64 / width as f64).min(bound as f64 / height as f64);
    let fit_w = ((width as f64 * ratio).round() as u32).clamp(1, bound);
    let fit_h = ((height as f64 * ratio).round() as u32).clamp(1, bound);
    (fit_w, fit_h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{load_from_memory, GenericImageView};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        }))
    }

    #[test]
    fn png_render_has_target_dimensions() {
        let bytes = ImageRasterizer
            .render(&gradient(300, 200), 150, 100, RasterFormat::png())
            .unwrap();
        let decoded = load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (150, 100));
    }

    #[test]
    fn jpeg_drops_alpha() {
        let bytes = ImageRasterizer
            .render(&gradient(40, 40), 20, 20, RasterFormat::Jpeg { quality: 80 })
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn ico_is_capped() {
        assert_eq!(ico_dimensions(1024, 512), (256, 128));
        assert_eq!(ico_dimensions(64, 64), (64, 64));

        let bytes = ImageRasterizer
            .render(&gradient(600, 300), 600, 300, RasterFormat::Ico)
            .unwrap();
        // reserved=0, type=1 (icon), count=1
        assert_eq!(&bytes[..6], &[0, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(ImageRasterizer.resize(&gradient(4, 4), 0, 4).is_err());
    }

    #[test]
    fn square_render_centers_content() {
        let bytes = ImageRasterizer
            .render_square(&gradient(200, 100), 64, RasterFormat::png())
            .unwrap();
        let decoded = load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (64, 64));
        // letterbox rows stay transparent
        assert_eq!(decoded.get_pixel(32, 0)[3], 0);
        assert_eq!(decoded.get_pixel(32, 32)[3], 255);
    }
}
