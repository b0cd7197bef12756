use hlsforge_common::Resolution;
use hlsforge_media::codecs_for_profile;
use serde::{Deserialize, Serialize};

/// One rung of the adaptive-bitrate ladder.
///
/// Bitrates are kilobits per second.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenditionPreset {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub video_bitrate: u32,
    pub max_bitrate: u32,
    pub buffer_size: u32,
    pub audio_bitrate: u32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default = "default_segment_duration")]
    pub segment_duration_s: u32,
    pub encoder_profile: String,
    #[serde(default = "default_speed_preset")]
    pub encoder_speed_preset: String,
    #[serde(default = "default_gop_size")]
    pub gop_size: u32,
}

fn default_frame_rate() -> u32 {
    30
}
fn default_segment_duration() -> u32 {
    6
}
fn default_speed_preset() -> String {
    "veryfast".to_string()
}
fn default_gop_size() -> u32 {
    60
}

impl RenditionPreset {
    #[allow(clippy::too_many_arguments)]
    fn standard(
        label: &str,
        width: u32,
        height: u32,
        video_bitrate: u32,
        max_bitrate: u32,
        buffer_size: u32,
        audio_bitrate: u32,
        encoder_profile: &str,
    ) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            video_bitrate,
            max_bitrate,
            buffer_size,
            audio_bitrate,
            frame_rate: default_frame_rate(),
            segment_duration_s: default_segment_duration(),
            encoder_profile: encoder_profile.to_string(),
            encoder_speed_preset: default_speed_preset(),
            gop_size: default_gop_size(),
        }
    }

    /// The target box.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Peak bandwidth advertised in the master manifest, in bits per second.
    pub fn bandwidth_bps(&self) -> u64 {
        (self.max_bitrate as u64 + self.audio_bitrate as u64) * 1000
    }

    /// Average bandwidth advertised in the master manifest, in bits per second.
    pub fn average_bandwidth_bps(&self) -> u64 {
        (self.video_bitrate as u64 + self.audio_bitrate as u64) * 1000
    }

    pub fn codecs(&self) -> String {
        codecs_for_profile(&self.encoder_profile)
    }
}

/// The built-in ladder, highest quality first.
pub fn default_presets() -> Vec<RenditionPreset> {
    vec![
        RenditionPreset::standard("2160p", 3840, 2160, 16000, 17120, 32000, 192, "high"),
        RenditionPreset::standard("1080p", 1920, 1080, 5800, 6200, 11600, 192, "high"),
        RenditionPreset::standard("720p", 1280, 720, 3500, 3750, 7000, 128, "high"),
        RenditionPreset::standard("480p", 854, 480, 1600, 1710, 3200, 128, "main"),
        RenditionPreset::standard("360p", 640, 360, 900, 960, 1800, 96, "main"),
    ]
}

/// Human-readable quality name for a probed height.
pub fn quality_label(height: u32) -> &'static str {
    match height {
        h if h >= 2160 => "2160p",
        h if h >= 1440 => "1440p",
        h if h >= 1080 => "1080p",
        h if h >= 720 => "720p",
        h if h >= 480 => "480p",
        h if h >= 360 => "360p",
        h if h > 0 => "240p",
        _ => "unknown",
    }
}

/// Immutable set of rendition presets, ordered by descending resolution.
#[derive(Debug, Clone)]
pub struct QualityCatalog {
    presets: Vec<RenditionPreset>,
}

impl QualityCatalog {
    /// Build a catalog from presets. The order given is kept.
    pub fn new(presets: Vec<RenditionPreset>) -> Self {
        Self { presets }
    }

    pub fn presets(&self) -> &[RenditionPreset] {
        &self.presets
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenditionPreset> {
        self.presets.iter()
    }

    /// Look up a preset by label, ignoring case.
    pub fn get(&self, label: &str) -> Option<&RenditionPreset> {
        self.presets
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(label))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for QualityCatalog {
    fn default() -> Self {
        Self::new(default_presets())
    }
}
