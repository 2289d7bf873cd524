use super::preset::{FrameRate, PresetKey, QualityPreset, Resolution, ResolutionPreset};

/// A preset plus the resolution the user picked, which only matters when
/// the preset keeps the original resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionRequest {
    pub preset: QualityPreset,
    pub selected: (u32, u32),
}

impl ConversionRequest {
    pub fn new(key: PresetKey, selected: ResolutionPreset) -> Self {
        Self {
            preset: *key.preset(),
            selected: selected.dimensions(),
        }
    }

    /// The default download: medium quality at the selected resolution.
    pub fn main_download(selected: ResolutionPreset) -> Self {
        let (width, height) = selected.dimensions();
        Self {
            preset: PresetKey::Medium.preset().with_resolution(width, height),
            selected: (width, height),
        }
    }

    /// Dimensions the scale filter will use
    pub fn output_dimensions(&self) -> (u32, u32) {
        match self.preset.video.resolution {
            Resolution::Fixed { width, height } => (width, height),
            Resolution::Original => self.selected,
        }
    }

    /// ffmpeg arguments, from `-i <input>` through `<output>`.
    pub fn build_args(&self, input: &str, output: &str) -> Vec<String> {
        let QualityPreset {
            video,
            audio,
            faststart,
            ..
        } = self.preset;

        let mut args: Vec<String> = vec!["-i".into(), input.into()];

        let (width, height) = self.output_dimensions();
        args.extend(["-vf".into(), Resolution::scale_filter(width, height)]);

        if !video.codec.is_empty() {
            args.extend(["-c:v".into(), video.codec.into()]);
        }
        args.extend(["-crf".into(), video.crf.to_string()]);
        if !video.speed.is_empty() {
            args.extend(["-preset".into(), video.speed.into()]);
        }
        if let FrameRate::Fps(fps) = video.fps {
            args.extend(["-r".into(), fps.to_string()]);
        }

        if !audio.codec.is_empty() {
            args.extend(["-c:a".into(), audio.codec.into()]);
        }
        if !audio.bitrate.is_empty() {
            args.extend(["-b:a".into(), audio.bitrate.into()]);
        }
        if audio.channels > 0 {
            args.extend(["-ac".into(), audio.channels.to_string()]);
        }

        if faststart {
            args.extend(["-movflags".into(), "faststart".into()]);
        }

        args.push(output.into());
        args
    }
}
