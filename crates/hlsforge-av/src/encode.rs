//! ffmpeg argument construction for one HLS rendition.

use hlsforge_common::paths::{SEGMENT_PATTERN, SUB_MANIFEST};
use hlsforge_common::Resolution;
use std::path::Path;

/// Fit `source` inside the `target` box, preserving aspect ratio.
///
/// Both output dimensions are truncated to an even number, as required by
/// 4:2:0 chroma subsampling. An unknown source keeps the target box.
///
/// # Examples
///
/// ```
/// use hlsforge_av::encode::compute_scale;
/// use hlsforge_common::Resolution;
///
/// let out = compute_scale(Resolution::new(1920, 800), Resolution::new(1280, 720));
/// assert_eq!(out, Resolution::new(1280, 532));
/// ```
pub fn compute_scale(source: Resolution, target: Resolution) -> Resolution {
    if !source.is_known() {
        return Resolution::new(even(target.width as u64), even(target.height as u64));
    }

    let (sw, sh) = (source.width as u64, source.height as u64);
    let (tw, th) = (target.width as u64, target.height as u64);

    // ratio = min(tw / sw, th / sh), compared without floating point
    if tw * sh <= th * sw {
        Resolution::new(even(tw), even(sh * tw / sw))
    } else {
        Resolution::new(even(sw * th / sh), even(th))
    }
}

fn even(value: u64) -> u32 {
    let value = u32::try_from(value).unwrap_or(u32::MAX);
    (value & !1).max(2)
}

/// Encoder settings for one HLS rendition.
#[derive(Debug, Clone)]
pub struct HlsEncode<'a> {
    pub input: &'a Path,
    /// Directory receiving `index.m3u8` and the segments.
    pub output_dir: &'a Path,
    pub size: Resolution,
    pub video_kbps: u32,
    pub max_kbps: u32,
    pub buffer_kbps: u32,
    pub audio_kbps: u32,
    pub frame_rate: u32,
    pub gop_size: u32,
    pub segment_secs: u32,
    pub profile: &'a str,
    pub speed_preset: &'a str,
}

impl HlsEncode<'_> {
    /// Build the ffmpeg argument list.
    ///
    /// Progress is written as `key=value` lines to stderr. stdin is left open
    /// so the caller can request a graceful stop with `q`.
    pub fn args(&self) -> Vec<String> {
        let segment_pattern = self.output_dir.join(SEGMENT_PATTERN);
        let playlist = self.output_dir.join(SUB_MANIFEST);
        let gop = self.gop_size.to_string();

        let mut args: Vec<String> = Vec::new();
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

        push(&["-hide_banner", "-y", "-loglevel", "warning"]);
        push(&["-i", &self.input.to_string_lossy()]);
        push(&["-map", "0:v:0", "-map", "0:a:0?"]);

        // Video
        push(&[
            "-vf",
            &format!("scale={}:{}", self.size.width, self.size.height),
            "-c:v",
            "libx264",
            "-profile:v",
            self.profile,
            "-preset",
            self.speed_preset,
            "-pix_fmt",
            "yuv420p",
        ]);
        push(&["-b:v", &format!("{}k", self.video_kbps)]);
        push(&["-maxrate", &format!("{}k", self.max_kbps)]);
        push(&["-bufsize", &format!("{}k", self.buffer_kbps)]);
        push(&["-r", &self.frame_rate.to_string()]);
        push(&["-g", &gop, "-keyint_min", &gop, "-sc_threshold", "0"]);
        push(&[
            "-force_key_frames",
            &format!("expr:gte(t,n_forced*{})", self.segment_secs),
        ]);

        // Audio
        push(&["-c:a", "aac", "-b:a", &format!("{}k", self.audio_kbps), "-ac", "2"]);

        // HLS muxer
        push(&[
            "-f",
            "hls",
            "-hls_time",
            &self.segment_secs.to_string(),
            "-hls_playlist_type",
            "vod",
            "-hls_flags",
            "independent_segments",
            "-hls_segment_filename",
            &segment_pattern.to_string_lossy(),
        ]);

        push(&["-progress", "pipe:2", "-nostats"]);
        push(&[&playlist.to_string_lossy()]);

        args
    }
}
