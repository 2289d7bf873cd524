//! Multi-page PDF assembly using `printpdf` 0.8.
//!
//! Images are stacked top to bottom at a fixed page width; a new page starts
//! whenever the next image would run past the bottom edge.

use anyhow::Result;
use imageproc::image::{DynamicImage, Rgb, RgbImage};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};

/// A4 portrait
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

// At 72 dpi one image pixel is one PDF point, which keeps scale factors simple
const IMAGE_DPI: f32 = 72.0;

/// Builds a paged document out of already sized rasters
pub trait DocumentComposer {
    fn compose(&self, title: &str, images: &[DynamicImage]) -> Result<Vec<u8>>;
}

/// Where one image lands, in millimetres from the top-left of its page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub page: usize,
    pub x: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Stack images of the given pixel sizes onto fixed-size pages.
///
/// Each image is scaled to the page width; an image taller than a whole page
/// is shrunk to the page height instead and centered horizontally.
pub fn layout(sizes: &[(u32, u32)], page_width: f32, page_height: f32) -> Vec<Placement> {
    let mut placements = Vec::with_capacity(sizes.len());
    let mut page = 0;
    let mut cursor = 0.0f32;

    for &(px_w, px_h) in sizes {
        if px_w == 0 || px_h == 0 {
            continue;
        }

        let mut width = page_width;
        let mut height = page_width * px_h as f32 / px_w as f32;
        if height > page_height {
            width *= page_height / height;
            height = page_height;
        }

        if cursor > 0.0 && cursor + height > page_height {
            page += 1;
            cursor = 0.0;
        }

        placements.push(Placement {
            page,
            x: (page_width - width) / 2.0,
            top: cursor,
            width,
            height,
        });
        cursor += height;
    }

    placements
}

#[derive(Debug, Clone, Copy)]
pub struct PdfComposer {
    page_width: f32,
    page_height: f32,
}

impl Default for PdfComposer {
    fn default() -> Self {
        Self {
            page_width: PAGE_WIDTH_MM,
            page_height: PAGE_HEIGHT_MM,
        }
    }
}

impl DocumentComposer for PdfComposer {
    fn compose(&self, title: &str, images: &[DynamicImage]) -> Result<Vec<u8>> {
        if images.is_empty() {
            anyhow::bail!("No images to place in the PDF");
        }

        let sizes: Vec<(u32, u32)> = images.iter().map(|i| (i.width(), i.height())).collect();
        let placements = layout(&sizes, self.page_width, self.page_height);
        let page_count = placements.last().map_or(1, |p| p.page + 1);

        let mut doc = PdfDocument::new(title);
        let mut page_ops: Vec<Vec<Op>> = (0..page_count).map(|_| Vec::new()).collect();
        let page_height_pt = Mm(self.page_height).into_pt().0;

        let sized = images.iter().filter(|i| i.width() > 0 && i.height() > 0);
        for (image, placement) in sized.zip(&placements) {
            let rgb = flatten_on_white(image);
            let (px_w, px_h) = rgb.dimensions();
            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: px_w as usize,
                height: px_h as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let width_pt = Mm(placement.width).into_pt().0;
            let height_pt = Mm(placement.height).into_pt().0;
            // PDF space grows upwards from the bottom-left corner
            let bottom_pt = page_height_pt - Mm(placement.top).into_pt().0 - height_pt;

            page_ops[placement.page].push(Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(Mm(placement.x).into_pt().0)),
                    translate_y: Some(Pt(bottom_pt)),
                    scale_x: Some(width_pt / px_w as f32),
                    scale_y: Some(height_pt / px_h as f32),
                    dpi: Some(IMAGE_DPI),
                    rotate: None,
                },
            });
        }

        let pages = page_ops
            .into_iter()
            .map(|ops| PdfPage::new(Mm(self.page_width), Mm(self.page_height), ops))
            .collect();
        doc.with_pages(pages);

        log::debug!("Composed PDF with {} images on {page_count} pages", images.len());

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            log::debug!("printpdf reported {} warnings", warnings.len());
        }

        Ok(output)
    }
}

// PDF image XObjects here carry no alpha; transparent areas should read as paper
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let alpha = p[3] as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{Rgba, RgbaImage};

    #[test]
    fn images_stack_at_page_width() {
        let placements = layout(&[(200, 100), (400, 200)], 210.0, 297.0);
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].top, 0.0);
        assert_eq!(placements[0].width, 210.0);
        assert_eq!(placements[0].height, 105.0);
        assert_eq!(placements[1].page, 0);
        assert_eq!(placements[1].top, 105.0);
    }

    #[test]
    fn overflow_starts_a_new_page() {
        let placements = layout(&[(100, 100), (100, 100)], 210.0, 297.0);
        assert_eq!(placements[0].page, 0);
        assert_eq!(placements[1].page, 1);
        assert_eq!(placements[1].top, 0.0);
    }

    #[test]
    fn tall_images_shrink_to_page_height() {
        let placements = layout(&[(100, 1000)], 210.0, 297.0);
        assert_eq!(placements[0].height, 297.0);
        assert!((placements[0].width - 29.7).abs() < 0.01);
        assert!((placements[0].x - 90.15).abs() < 0.01);
    }

    #[test]
    fn transparent_pixels_become_white() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(flatten_on_white(&image).get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn composes_a_pdf() {
        let images = vec![
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 10, Rgba([9, 9, 9, 255]))),
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([9, 9, 9, 255]))),
        ];
        let bytes = PdfComposer::default().compose("test", &images).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
