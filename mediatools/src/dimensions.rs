//! Target dimensions with an optional aspect-ratio lock

/// Width/height the user wants to export at.
///
/// While `locked`, editing one side recomputes the other from `ratio`, which
/// is captured when an image is loaded or when the lock is re-enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionState {
    width: u32,
    height: u32,
    locked: bool,
    ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionError(String);

impl std::fmt::Display for DimensionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("Invalid dimension: ")?;
        f.write_str(&self.0)
    }
}

impl std::error::Error for DimensionError {}

impl Default for DimensionState {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            locked: true,
            ratio: 1.0,
        }
    }
}

impl DimensionState {
    /// Fresh state for a newly loaded image: locked, ratio taken from it.
    pub fn for_image(width: u32, height: u32) -> Self {
        let mut state = Self {
            width,
            height,
            locked: true,
            ratio: 1.0,
        };
        state.capture_ratio();
        state
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Apply a width typed by the user. Rejected input leaves the state untouched.
    pub fn set_width(&mut self, input: &str) -> Result<(), DimensionError> {
        let width = parse_dimension(input)?;
        let height = if self.locked {
            derived_dimension(width as f64 / self.ratio)?
        } else {
            self.height
        };
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Apply a height typed by the user. Rejected input leaves the state untouched.
    pub fn set_height(&mut self, input: &str) -> Result<(), DimensionError> {
        let height = parse_dimension(input)?;
        let width = if self.locked {
            derived_dimension(height as f64 * self.ratio)?
        } else {
            self.width
        };
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Turning the lock on re-captures the ratio from the current fields.
    pub fn set_locked(&mut self, locked: bool) {
        if locked && !self.locked {
            self.capture_ratio();
        }
        self.locked = locked;
    }

    // A zero side keeps the previous ratio, so `ratio` is always positive.
    fn capture_ratio(&mut self) {
        if self.width != 0 && self.height != 0 {
            self.ratio = self.width as f64 / self.height as f64;
        }
    }
}

fn parse_dimension(input: &str) -> Result<u32, DimensionError> {
    let trimmed = input.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| DimensionError(format!("`{trimmed}` is not a number")))?;

    if !value.is_finite() {
        return Err(DimensionError(format!("`{trimmed}` is not a number")));
    }
    if value < 0.0 {
        return Err(DimensionError(format!("`{trimmed}` is negative")));
    }
    if value > u32::MAX as f64 {
        return Err(DimensionError(format!("`{trimmed}` is too large")));
    }

    Ok(value.round() as u32)
}

// The side recomputed under the lock must fit too.
fn derived_dimension(value: f64) -> Result<u32, DimensionError> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded > u32::MAX as f64 {
        return Err(DimensionError(format!(
            "the other side would be {value:.0} pixels"
        )));
    }
    Ok(rounded as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_width_drives_height() {
        let mut dims = DimensionState::for_image(300, 300);
        dims.set_width("150").unwrap();
        assert_eq!(dims.dimensions(), (150, 150));
    }

    #[test]
    fn locked_height_drives_width() {
        let mut dims = DimensionState::for_image(1920, 1080);
        dims.set_height("540").unwrap();
        assert_eq!(dims.dimensions(), (960, 540));
    }

    #[test]
    fn rounds_to_nearest() {
        let mut dims = DimensionState::for_image(1000, 333);
        dims.set_width("100").unwrap();
        // 100 / 3.003.. = 33.3
        assert_eq!(dims.height(), 33);
        dims.set_height("50").unwrap();
        // 50 * 3.003.. = 150.15
        assert_eq!(dims.width(), 150);
    }

    #[test]
    fn unlocked_edits_only_the_edited_field() {
        let mut dims = DimensionState::for_image(300, 300);
        dims.set_locked(false);
        dims.set_width("500").unwrap();
        assert_eq!(dims.dimensions(), (500, 300));
        dims.set_height("10").unwrap();
        assert_eq!(dims.dimensions(), (500, 10));
    }

    #[test]
    fn relock_captures_current_ratio() {
        let mut dims = DimensionState::for_image(300, 300);
        dims.set_locked(false);
        dims.set_width("600").unwrap();
        dims.set_locked(true);
        assert_eq!(dims.ratio(), 2.0);
        dims.set_height("100").unwrap();
        assert_eq!(dims.dimensions(), (200, 100));
    }

    #[test]
    fn relock_with_zero_height_keeps_old_ratio() {
        let mut dims = DimensionState::for_image(400, 200);
        dims.set_locked(false);
        dims.set_height("0").unwrap();
        dims.set_locked(true);
        assert_eq!(dims.ratio(), 2.0);
        dims.set_width("100").unwrap();
        assert_eq!(dims.height(), 50);
    }

    #[test]
    fn relock_with_zero_width_keeps_old_ratio() {
        let mut dims = DimensionState::for_image(300, 200);
        dims.set_locked(false);
        dims.set_width("0").unwrap();
        dims.set_locked(true);
        assert_eq!(dims.ratio(), 1.5);
        dims.set_width("150").unwrap();
        assert_eq!(dims.dimensions(), (150, 100));
    }

    #[test]
    fn oversized_derived_side_is_rejected() {
        let mut dims = DimensionState::for_image(100, 200);
        assert!(dims.set_width("4000000000").is_err());
        assert_eq!(dims.dimensions(), (100, 200));

        let mut dims = DimensionState::for_image(200, 100);
        assert!(dims.set_height("4000000000").is_err());
        assert_eq!(dims.dimensions(), (200, 100));
    }

    #[test]
    fn zero_height_image_does_not_divide_by_zero() {
        let dims = DimensionState::for_image(10, 0);
        assert_eq!(dims.ratio(), 1.0);
    }

    #[test]
    fn rejects_negative_and_garbage() {
        let mut dims = DimensionState::for_image(300, 200);
        assert!(dims.set_width("-5").is_err());
        assert!(dims.set_width("abc").is_err());
        assert!(dims.set_height("").is_err());
        assert!(dims.set_height("NaN").is_err());
        assert_eq!(dims.dimensions(), (300, 200));
    }
}
