use std::fs;
use std::path::PathBuf;

use crate::export::{ExportFormat, DEFAULT_JPEG_QUALITY};
use crate::session::DEFAULT_BASE_NAME;
use crate::video::{PresetKey, ResolutionPreset};

pub const DEFAULT_REMOTE_ENDPOINT: &str = "http://localhost:3001";

/// Preferences persisted between runs
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_name: String,
    pub export_format: ExportFormat,
    // JPEG quality: 1-100
    pub jpeg_quality: u8,
    pub lock_ratio: bool,
    // None means the main download: medium quality at `resolution`
    pub video_preset: Option<PresetKey>,
    pub resolution: ResolutionPreset,
    pub remote_endpoint: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_name: DEFAULT_BASE_NAME.to_string(),
            export_format: ExportFormat::Png,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            lock_ratio: true,
            video_preset: None,
            resolution: ResolutionPreset::FullHd,
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Option<Self> {
        let config_path = Self::config_path()?;

        fs::read_to_string(&config_path)
            .ok()
            .and_then(|contents| Self::from_json(&contents))
    }

    pub fn save(&self) -> Option<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).ok()?;
        }

        serde_json::to_string_pretty(self)
            .ok()
            .and_then(|json| fs::write(&config_path, json).ok())
    }

    pub fn config_path() -> Option<PathBuf> {
        let home = std::env::home_dir()?;
        Some(home.join(".config").join("mediatools").join("config.json"))
    }

    fn from_json(contents: &str) -> Option<Self> {
        serde_json::from_str(contents)
            .map_err(|e| log::warn!("Ignoring unreadable config: {e}"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = AppConfig::from_json(r#"{"export_format":"jpg"}"#).unwrap();
        assert_eq!(config.export_format, ExportFormat::Jpg);
        assert_eq!(config.base_name, DEFAULT_BASE_NAME);
        assert_eq!(config.video_preset, None);
        assert_eq!(config.remote_endpoint, DEFAULT_REMOTE_ENDPOINT);
    }

    #[test]
    fn round_trips_through_json() {
        let config = AppConfig {
            base_name: "brand".into(),
            resolution: ResolutionPreset::HdPlus,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""resolution":"hdplus""#));
        assert_eq!(AppConfig::from_json(&json), Some(config));
    }

    #[test]
    fn garbage_is_ignored() {
        assert_eq!(AppConfig::from_json("not json"), None);
    }
}
