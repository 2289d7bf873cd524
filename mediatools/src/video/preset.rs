use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter};

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRate {
    Original,
    Fps(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Original,
    Fixed { width: u32, height: u32 },
}

impl Resolution {
    /// ffmpeg `scale` filter argument, `W:H`
    pub fn scale_filter(width: u32, height: u32) -> String {
        format!("scale={width}:{height}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub codec: &'static str,
    pub crf: u8,
    pub speed: &'static str,
    pub fps: FrameRate,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSettings {
    pub codec: &'static str,
    pub bitrate: &'static str,
    pub channels: u8,
}

/// One row of the quality table. Read-only; a conversion may copy one and
/// override its resolution, never edit the table itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    pub key: PresetKey,
    pub label: &'static str,
    pub video: VideoSettings,
    pub audio: AudioSettings,
    pub faststart: bool,
}

impl QualityPreset {
    pub fn get(key: PresetKey) -> &'static QualityPreset {
        match key {
            PresetKey::Minimal => &MINIMAL,
            PresetKey::Low => &LOW,
            PresetKey::Medium => &MEDIUM,
            PresetKey::High => &HIGH,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.video.resolution = Resolution::Fixed { width, height };
        self
    }

    /// JSON shape understood by the remote conversion endpoint
    pub fn to_json(&self) -> serde_json::Value {
        let fps = match self.video.fps {
            FrameRate::Original => serde_json::json!("original"),
            FrameRate::Fps(fps) => serde_json::json!(fps),
        };
        let resolution = match self.video.resolution {
            Resolution::Original => "original".to_string(),
            Resolution::Fixed { width, height } => format!("{width}x{height}"),
        };

        serde_json::json!({
            "key": self.key.as_str(),
            "video": {
                "codec": self.video.codec,
                "crf": self.video.crf,
                "preset": self.video.speed,
                "fps": fps,
                "resolution": resolution,
            },
            "audio": {
                "codec": self.audio.codec,
                "bitrate": self.audio.bitrate,
                "channels": self.audio.channels,
            },
            "extra": { "faststart": self.faststart },
        })
    }
}

const MINIMAL: QualityPreset = QualityPreset {
    key: PresetKey::Minimal,
    label: "Minimal - smallest file, low quality",
    video: VideoSettings {
        codec: "libx264",
        crf: 30,
        speed: "ultrafast",
        fps: FrameRate::Fps(15),
        resolution: Resolution::Fixed {
            width: 640,
            height: 360,
        },
    },
    audio: AudioSettings {
        codec: "aac",
        bitrate: "64k",
        channels: 1,
    },
    faststart: true,
};

const LOW: QualityPreset = QualityPreset {
    key: PresetKey::Low,
    label: "Low - takes less space",
    video: VideoSettings {
        codec: "libx264",
        crf: 26,
        speed: "fast",
        fps: FrameRate::Fps(24),
        resolution: Resolution::Fixed {
            width: 1280,
            height: 720,
        },
    },
    audio: AudioSettings {
        codec: "aac",
        bitrate: "96k",
        channels: 2,
    },
    faststart: true,
};

const MEDIUM: QualityPreset = QualityPreset {
    key: PresetKey::Medium,
    label: "Medium - balanced",
    video: VideoSettings {
        codec: "libx264",
        crf: 23,
        speed: "medium",
        fps: FrameRate::Original,
        resolution: Resolution::Fixed {
            width: 1920,
            height: 1080,
        },
    },
    audio: AudioSettings {
        codec: "aac",
        bitrate: "128k",
        channels: 2,
    },
    faststart: true,
};

const HIGH: QualityPreset = QualityPreset {
    key: PresetKey::High,
    label: "High - archive quality",
    video: VideoSettings {
        codec: "libx264",
        crf: 18,
        speed: "slow",
        fps: FrameRate::Original,
        resolution: Resolution::Original,
    },
    audio: AudioSettings {
        codec: "aac",
        bitrate: "192k",
        channels: 2,
    },
    faststart: true,
};

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumCount, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum PresetKey {
    Minimal,
    Low,
    Medium,
    High,
}

impl PresetKey {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PresetKey::Minimal => "minimal",
            PresetKey::Low => "low",
            PresetKey::Medium => "medium",
            PresetKey::High => "high",
        }
    }

    pub fn preset(self) -> &'static QualityPreset {
        QualityPreset::get(self)
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumCount, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPreset {
    FullHd,
    HdPlus,
    Hd,
    Sd,
}

impl ResolutionPreset {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }

    pub fn key(self) -> &'static str {
        match self {
            ResolutionPreset::FullHd => "fullhd",
            ResolutionPreset::HdPlus => "hdplus",
            ResolutionPreset::Hd => "hd",
            ResolutionPreset::Sd => "sd",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResolutionPreset::FullHd => "FULL HD 1080p",
            ResolutionPreset::HdPlus => "HD+ 900p",
            ResolutionPreset::Hd => "HD 720p",
            ResolutionPreset::Sd => "SD 480p",
        }
    }

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ResolutionPreset::FullHd => (1920, 1080),
            ResolutionPreset::HdPlus => (1600, 900),
            ResolutionPreset::Hd => (1280, 720),
            ResolutionPreset::Sd => (640, 480),
        }
    }
}

#[derive(Debug)]
pub struct ParseError(String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("Invalid video preset: ")?;
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

impl FromStr for PresetKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PresetKey::iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ParseError(s.to_string()))
    }
}

impl FromStr for ResolutionPreset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '_', '-', '+'], "");
        match normalized.as_str() {
            "fullhd" | "1080p" => Ok(ResolutionPreset::FullHd),
            "hdplus" | "hd+" | "900p" => Ok(ResolutionPreset::HdPlus),
            "hd" | "720p" => Ok(ResolutionPreset::Hd),
            "sd" | "480p" => Ok(ResolutionPreset::Sd),
            _ => Err(ParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_complete() {
        assert_eq!(PresetKey::iter().count(), PresetKey::COUNT);
        for key in PresetKey::iter() {
            let preset = key.preset();
            assert_eq!(preset.key, key);
            assert_eq!(preset.video.codec, "libx264");
            assert!(preset.faststart);
        }
        assert_eq!(PresetKey::High.preset().video.resolution, Resolution::Original);
    }

    #[test]
    fn parses_keys() {
        assert_eq!("Minimal".parse::<PresetKey>().unwrap(), PresetKey::Minimal);
        assert!("ultra".parse::<PresetKey>().is_err());
        assert_eq!(
            "hd+".parse::<ResolutionPreset>().unwrap(),
            ResolutionPreset::HdPlus
        );
        assert_eq!(
            "fullhd".parse::<ResolutionPreset>().unwrap(),
            ResolutionPreset::FullHd
        );
    }

    #[test]
    fn json_uses_original_markers() {
        let json = PresetKey::High.preset().to_json();
        assert_eq!(json["video"]["fps"], "original");
        assert_eq!(json["video"]["resolution"], "original");
        assert_eq!(json["audio"]["bitrate"], "192k");

        let json = PresetKey::Minimal.preset().to_json();
        assert_eq!(json["video"]["fps"], 15);
        assert_eq!(json["video"]["resolution"], "640x360");
        assert_eq!(json["extra"]["faststart"], true);
    }

    #[test]
    fn override_resolution_copies() {
        let preset = PresetKey::Medium.preset().with_resolution(1280, 720);
        assert_eq!(
            preset.video.resolution,
            Resolution::Fixed {
                width: 1280,
                height: 720
            }
        );
        // the table entry is untouched
        assert_eq!(
            PresetKey::Medium.preset().video.resolution,
            Resolution::Fixed {
                width: 1920,
                height: 1080
            }
        );
    }
}
