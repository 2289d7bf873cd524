//! Raster to SVG tracing

use anyhow::Result;
use imageproc::contours::find_contours;
use imageproc::contrast::otsu_level;
use imageproc::geometry::approximate_polygon_dp;
use imageproc::image::{imageops::FilterType, DynamicImage, GrayImage, Luma};

use std::fmt::Write;

// Tracing cost grows with the pixel count, so work on a bounded copy
const MAX_TRACE_DIMENSION: u32 = 512;
// Pixels more transparent than this count as background
const ALPHA_THRESHOLD: u8 = 128;
// Douglas-Peucker tolerance, in working pixels
const SIMPLIFY_EPSILON: f64 = 1.0;

/// Turns a raster into SVG markup of the given output size
pub trait VectorTracer {
    fn trace(&self, img: &DynamicImage, width: u32, height: u32) -> Result<String>;
}

/// Single-color tracer: Otsu threshold, border following, polygon simplification.
///
/// Produces one even-odd path filled with the average color of the foreground,
/// which suits logos and line art.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContourTracer;

impl VectorTracer for ContourTracer {
    fn trace(&self, img: &DynamicImage, width: u32, height: u32) -> Result<String> {
        if width == 0 || height == 0 {
            anyhow::bail!("Invalid SVG dimensions {width}x{height}");
        }

        let working = if img.width() > MAX_TRACE_DIMENSION || img.height() > MAX_TRACE_DIMENSION {
            img.resize(MAX_TRACE_DIMENSION, MAX_TRACE_DIMENSION, FilterType::Triangle)
        } else {
            img.clone()
        };
        let rgba = working.to_rgba8();
        let (work_w, work_h) = rgba.dimensions();

        let luma = GrayImage::from_fn(work_w, work_h, |x, y| {
            let p = rgba.get_pixel(x, y);
            if p[3] < ALPHA_THRESHOLD {
                Luma([255])
            } else {
                Luma([luminance(p[0], p[1], p[2])])
            }
        });
        let level = otsu_level(&luma);

        let mut sum = [0u64; 3];
        let mut count = 0u64;
        let mask = GrayImage::from_fn(work_w, work_h, |x, y| {
            let p = rgba.get_pixel(x, y);
            if p[3] >= ALPHA_THRESHOLD && luma.get_pixel(x, y)[0] <= level {
                sum[0] += p[0] as u64;
                sum[1] += p[1] as u64;
                sum[2] += p[2] as u64;
                count += 1;
                Luma([255])
            } else {
                Luma([0])
            }
        });

        let fill = if count == 0 {
            [0, 0, 0]
        } else {
            sum.map(|c| (c / count) as u8)
        };

        let scale_x = width as f64 / work_w as f64;
        let scale_y = height as f64 / work_h as f64;

        let mut path = String::new();
        let mut shapes = 0;
        for contour in find_contours::<i32>(&mask) {
            let points = approximate_polygon_dp(&contour.points, SIMPLIFY_EPSILON, true);
            if points.len() < 3 {
                continue;
            }
            for (i, point) in points.iter().enumerate() {
                let cmd = if i == 0 { 'M' } else { 'L' };
                let _ = write!(
                    path,
                    "{cmd}{} {} ",
                    round2(point.x as f64 * scale_x),
                    round2(point.y as f64 * scale_y)
                );
            }
            path.push_str("Z ");
            shapes += 1;
        }

        log::debug!(
            "Traced {work_w}x{work_h} raster into {shapes} shapes (threshold {level})"
        );

        Ok(svg_document(width, height, fill, path.trim_end()))
    }
}

fn svg_document(width: u32, height: u32, fill: [u8; 3], path: &str) -> String {
    let [r, g, b] = fill;
    let body = if path.is_empty() {
        String::new()
    } else {
        format!(
            r##"
  <path fill="#{r:02x}{g:02x}{b:02x}" fill-rule="evenodd" d="{path}"/>"##
        )
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">{body}
</svg>
"#
    )
}

fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
