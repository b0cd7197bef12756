//! HLS playlist structures.

use std::fmt::Write;

/// RFC 6381 codec string for AAC-LC audio.
pub const AAC_LC: &str = "mp4a.40.2";

/// Codec string for an H.264 profile at level 4.0/3.1, paired with AAC-LC.
///
/// Unknown profiles fall back to High, the widest-compatible choice for the
/// levels used here.
pub fn codecs_for_profile(profile: &str) -> String {
    let video = match profile.to_ascii_lowercase().as_str() {
        "baseline" => "avc1.42e01e",
        "main" => "avc1.4d401f",
        _ => "avc1.640028",
    };
    format!("{},{}", video, AAC_LC)
}

/// Master playlist with multiple renditions.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterPlaylist {
    /// Stream variants, in output order.
    pub streams: Vec<StreamInfo>,
    /// Emit `#EXT-X-INDEPENDENT-SEGMENTS`.
    pub independent_segments: bool,
}

impl MasterPlaylist {
    /// Create a new master playlist.
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            independent_segments: true,
        }
    }

    /// Add a stream variant.
    pub fn add_stream(mut self, stream: StreamInfo) -> Self {
        self.streams.push(stream);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Render to M3U8 string.
    pub fn render(&self) -> String {
        let mut out = String::new();

        writeln!(out, "#EXTM3U").unwrap();
        writeln!(out, "#EXT-X-VERSION:6").unwrap();
        if self.independent_segments {
            writeln!(out, "#EXT-X-INDEPENDENT-SEGMENTS").unwrap();
        }

        for stream in &self.streams {
            write!(out, "#EXT-X-STREAM-INF:BANDWIDTH={}", stream.bandwidth).unwrap();

            if let Some(average) = stream.average_bandwidth {
                write!(out, ",AVERAGE-BANDWIDTH={}", average).unwrap();
            }

            write!(out, ",RESOLUTION={}x{}", stream.width, stream.height).unwrap();

            if let Some(frame_rate) = stream.frame_rate {
                write!(out, ",FRAME-RATE={:.3}", frame_rate).unwrap();
            }

            if !stream.codecs.is_empty() {
                write!(out, ",CODECS=\"{}\"", stream.codecs).unwrap();
            }

            if let Some(ref name) = stream.name {
                write!(out, ",NAME=\"{}\"", name).unwrap();
            }

            writeln!(out).unwrap();
            writeln!(out, "{}", stream.uri).unwrap();
        }

        out
    }
}

impl Default for MasterPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream variant information.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Playlist URI, relative to the master playlist.
    pub uri: String,
    /// Peak bandwidth in bits per second.
    pub bandwidth: u64,
    /// Average bandwidth in bits per second.
    pub average_bandwidth: Option<u64>,
    /// Video width.
    pub width: u32,
    /// Video height.
    pub height: u32,
    /// Codec string (e.g., "avc1.640028,mp4a.40.2").
    pub codecs: String,
    /// Frame rate.
    pub frame_rate: Option<f64>,
    /// Human-readable rendition name.
    pub name: Option<String>,
}
