use crate::dimensions::{DimensionError, DimensionState};
use crate::image::LoadedImage;

pub const DEFAULT_BASE_NAME: &str = "converted";

/// Everything the user is working on: the image carousel, the export
/// dimensions and the output base name.
///
/// All changes go through the transition methods so that the dimension state
/// always belongs to the image currently selected.
#[derive(Debug, Clone)]
pub struct Session {
    images: Vec<LoadedImage>,
    current: usize,
    dimensions: DimensionState,
    base_name: String,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            current: 0,
            dimensions: DimensionState::default(),
            base_name: DEFAULT_BASE_NAME.to_string(),
        }
    }
}

impl Session {
    pub fn new(images: Vec<LoadedImage>) -> Self {
        let mut session = Self::default();
        session.load(images);
        session
    }

    /// Replace the carousel contents and select the first image.
    pub fn load(&mut self, images: Vec<LoadedImage>) {
        self.images = images;
        self.current = 0;
        if let Some(first) = self.images.first() {
            self.base_name = first.stem().to_string();
        }
        self.sync_dimensions();
    }

    /// Drop every loaded image and start over.
    pub fn reset(&mut self) {
        log::debug!("Resetting session with {} images", self.images.len());
        *self = Self::default();
    }

    pub fn images(&self) -> &[LoadedImage] {
        &self.images
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&LoadedImage> {
        self.images.get(self.current)
    }

    /// Select an image by carousel position. Returns false only for an
    /// out-of-range index; re-selecting the current image keeps its edits.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.images.len() {
            return false;
        }
        if index != self.current {
            self.current = index;
            self.sync_dimensions();
        }
        true
    }

    /// Move to the next image, wrapping around.
    pub fn next(&mut self) {
        if self.images.len() > 1 {
            self.select((self.current + 1) % self.images.len());
        }
    }

    /// Move to the previous image, wrapping around.
    pub fn previous(&mut self) {
        if self.images.len() > 1 {
            let len = self.images.len();
            self.select((self.current + len - 1) % len);
        }
    }

    pub fn dimensions(&self) -> &DimensionState {
        &self.dimensions
    }

    pub fn set_width(&mut self, input: &str) -> Result<(), DimensionError> {
        self.dimensions.set_width(input)
    }

    pub fn set_height(&mut self, input: &str) -> Result<(), DimensionError> {
        self.dimensions.set_height(input)
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.dimensions.set_locked(locked);
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Blank names fall back to the default base name.
    pub fn set_base_name(&mut self, name: &str) {
        let name = name.trim();
        self.base_name = if name.is_empty() {
            DEFAULT_BASE_NAME.to_string()
        } else {
            name.to_string()
        };
    }

    fn sync_dimensions(&mut self) {
        self.dimensions = match self.current() {
            Some(image) => DimensionState::for_image(image.width, image.height),
            None => DimensionState::default(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{DynamicImage, RgbaImage};

    fn image(name: &str, width: u32, height: u32) -> LoadedImage {
        let raster = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        LoadedImage::from_decoded(raster, 1, name, "image/png", 0)
    }

    #[test]
    fn load_selects_first_and_sets_dimensions() {
        let session = Session::new(vec![image("cat.png", 300, 200), image("dog.png", 10, 10)]);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.dimensions().dimensions(), (300, 200));
        assert_eq!(session.base_name(), "cat");
    }

    #[test]
    fn carousel_wraps_and_resets_dimensions() {
        let mut session = Session::new(vec![image("a.png", 300, 200), image("b.png", 50, 100)]);
        session.set_width("150").unwrap();
        assert_eq!(session.dimensions().dimensions(), (150, 100));

        session.next();
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.dimensions().dimensions(), (50, 100));

        session.next();
        assert_eq!(session.current_index(), 0);
        session.previous();
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn select_out_of_range_is_ignored() {
        let mut session = Session::new(vec![image("a.png", 3, 3)]);
        assert!(!session.select(4));
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn selecting_the_current_image_succeeds() {
        let mut session = Session::new(vec![image("a.png", 4, 2), image("b.png", 3, 3)]);
        session.set_width("2").unwrap();
        assert!(session.select(0));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.dimensions().dimensions(), (2, 1));
    }

    #[test]
    fn reset_discards_everything() {
        let mut session = Session::new(vec![image("a.png", 3, 3)]);
        session.set_base_name("logo");
        session.reset();
        assert!(session.is_empty());
        assert!(session.current().is_none());
        assert_eq!(session.base_name(), DEFAULT_BASE_NAME);
    }

    #[test]
    fn blank_base_name_falls_back() {
        let mut session = Session::default();
        session.set_base_name("   ");
        assert_eq!(session.base_name(), DEFAULT_BASE_NAME);
        session.set_base_name(" brand ");
        assert_eq!(session.base_name(), "brand");
    }
}
