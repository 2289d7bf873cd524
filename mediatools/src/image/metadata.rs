//! EXIF metadata: orientation, capturing device and capture time

use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};

use std::io::Cursor;

const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifSummary {
    /// EXIF orientation tag, 1 when absent
    pub orientation: u32,
    pub make: Option<String>,
    pub model: Option<String>,
    pub captured_at: Option<NaiveDateTime>,
}

impl ExifSummary {
    /// "Make Model", deduplicated when the model already starts with the make.
    pub fn device_label(&self) -> Option<String> {
        match (self.make.as_deref(), self.model.as_deref()) {
            (Some(make), Some(model)) if model.starts_with(make) => Some(model.to_string()),
            (Some(make), Some(model)) => Some(format!("{make} {model}")),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        }
    }
}

/// Read the EXIF block of an encoded image. Anything unreadable yields the
/// default summary, i.e. an upright image with no device information.
pub fn read_exif(data: &[u8]) -> ExifSummary {
    let mut cursor = Cursor::new(data);
    let exif = match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(e) => {
            log::trace!("No usable EXIF block: {}", e);
            return ExifSummary {
                orientation: 1,
                ..Default::default()
            };
        }
    };

    let orientation = exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .filter(|v| (1..=8).contains(v))
        .unwrap_or(1);

    let ascii = |tag: Tag| -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        match field.value {
            Value::Ascii(ref parts) => parts
                .first()
                .map(|raw| String::from_utf8_lossy(raw).trim_matches(['\0', ' ']).to_string())
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    };

    let captured_at = ascii(Tag::DateTimeOriginal)
        .or_else(|| ascii(Tag::DateTime))
        .and_then(|s| NaiveDateTime::parse_from_str(&s, EXIF_DATE_FORMAT).ok());

    ExifSummary {
        orientation,
        make: ascii(Tag::Make),
        model: ascii(Tag::Model),
        captured_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_defaults_to_upright() {
        let summary = read_exif(b"definitely not an image");
        assert_eq!(summary.orientation, 1);
        assert_eq!(summary.device_label(), None);
    }

    #[test]
    fn device_label_joins_make_and_model() {
        let summary = ExifSummary {
            make: Some("Apple".into()),
            model: Some("iPhone 12".into()),
            ..Default::default()
        };
        assert_eq!(summary.device_label().as_deref(), Some("Apple iPhone 12"));

        let summary = ExifSummary {
            make: Some("Canon".into()),
            model: Some("Canon EOS R5".into()),
            ..Default::default()
        };
        assert_eq!(summary.device_label().as_deref(), Some("Canon EOS R5"));
    }
}
