//! EXIF orientation correction

use imageproc::image::DynamicImage;

/// The eight EXIF orientations, each mapped to the fixed transform that
/// makes the stored pixels display upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Tags outside 1-8 fall back to `Normal`.
    pub fn from_exif(tag: u32) -> Self {
        match tag {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    pub fn exif_tag(self) -> u8 {
        match self {
            Orientation::Normal => 1,
            Orientation::FlipHorizontal => 2,
            Orientation::Rotate180 => 3,
            Orientation::FlipVertical => 4,
            Orientation::Transpose => 5,
            Orientation::Rotate90 => 6,
            Orientation::Transverse => 7,
            Orientation::Rotate270 => 8,
        }
    }

    /// Tags 5-8 draw into a canvas with width and height exchanged.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90
                | Orientation::Transverse
                | Orientation::Rotate270
        )
    }

    pub fn corrected_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Normal => img,
            Orientation::FlipHorizontal => img.fliph(),
            Orientation::Rotate180 => img.rotate180(),
            Orientation::FlipVertical => img.flipv(),
            Orientation::Transpose => img.rotate90().fliph(),
            Orientation::Rotate90 => img.rotate90(),
            Orientation::Transverse => img.rotate270().fliph(),
            Orientation::Rotate270 => img.rotate270(),
        }
    }
}

/// Rotate/mirror `img` upright according to an EXIF orientation tag.
pub fn fix_orientation(img: DynamicImage, tag: u32) -> DynamicImage {
    let orientation = Orientation::from_exif(tag);
    if orientation != Orientation::Normal {
        log::debug!(
            "Correcting orientation {} on {}x{} image",
            orientation.exif_tag(),
            img.width(),
            img.height()
        );
    }
    orientation.apply(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{Rgba, RgbaImage};

    // 3 wide, 2 tall, every pixel distinct:
    //   a b c
    //   d e f
    fn sample() -> DynamicImage {
        let mut img = RgbaImage::new(3, 2);
        for (i, (x, y)) in [(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]
            .into_iter()
            .enumerate()
        {
            img.put_pixel(x, y, Rgba([i as u8 + 1, 0, 0, 255]));
        }
        DynamicImage::ImageRgba8(img)
    }

    fn grid(img: &DynamicImage) -> Vec<Vec<u8>> {
        let rgba = img.to_rgba8();
        (0..rgba.height())
            .map(|y| (0..rgba.width()).map(|x| rgba.get_pixel(x, y)[0]).collect())
            .collect()
    }

    #[test]
    fn tag_lookup_covers_all_eight() {
        for tag in 1..=8 {
            assert_eq!(Orientation::from_exif(tag).exif_tag() as u32, tag);
        }
        assert_eq!(Orientation::from_exif(0), Orientation::Normal);
        assert_eq!(Orientation::from_exif(9), Orientation::Normal);
    }

    #[test]
    fn only_tags_five_to_eight_swap() {
        for tag in 1..=8 {
            let (w, h) = Orientation::from_exif(tag).corrected_dimensions(3, 2);
            if tag >= 5 {
                assert_eq!((w, h), (2, 3), "tag {tag}");
            } else {
                assert_eq!((w, h), (3, 2), "tag {tag}");
            }
        }
    }

    #[test]
    fn pixel_transform_per_tag() {
        let expected: [Vec<Vec<u8>>; 8] = [
            vec![vec![1, 2, 3], vec![4, 5, 6]],
            vec![vec![3, 2, 1], vec![6, 5, 4]],
            vec![vec![6, 5, 4], vec![3, 2, 1]],
            vec![vec![4, 5, 6], vec![1, 2, 3]],
            vec![vec![1, 4], vec![2, 5], vec![3, 6]],
            vec![vec![4, 1], vec![5, 2], vec![6, 3]],
            vec![vec![6, 3], vec![5, 2], vec![4, 1]],
            vec![vec![3, 6], vec![2, 5], vec![1, 4]],
        ];

        for (i, want) in expected.iter().enumerate() {
            let tag = i as u32 + 1;
            let out = fix_orientation(sample(), tag);
            assert_eq!(&grid(&out), want, "tag {tag}");
            let dims = Orientation::from_exif(tag).corrected_dimensions(3, 2);
            assert_eq!((out.width(), out.height()), dims, "tag {tag}");
        }
    }

    #[test]
    fn tag_six_rotates_clockwise() {
        let out = fix_orientation(sample(), 6);
        assert_eq!((out.width(), out.height()), (2, 3));
        // top-left of the source ends up top-right
        assert_eq!(out.to_rgba8().get_pixel(1, 0)[0], 1);
    }
}
