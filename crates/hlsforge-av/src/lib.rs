//! # hlsforge-av
//!
//! ffmpeg and ffprobe integration for the hlsforge transcoder.
//!
//! This crate provides functionality for:
//! - Locating and version-checking the external media tools
//! - Probing a source's resolution and duration
//! - Building the ffmpeg argument list for one HLS rendition
//! - Parsing ffmpeg's progress output
//!
//! ## Example
//!
//! ```no_run
//! use hlsforge_av::{FfprobeProber, Prober};
//! use std::path::Path;
//!
//! # async fn example() {
//! let prober = FfprobeProber::new("ffprobe");
//! let info = prober.probe(Path::new("/uploads/intro.mp4")).await;
//! println!("{}x{} {:.1}s", info.width, info.height, info.duration_secs);
//! # }
//! ```

mod error;
pub mod encode;
pub mod probe;
pub mod progress;
pub mod tools;

// Re-exports
pub use encode::{compute_scale, HlsEncode};
pub use error::{Error, Result};
pub use probe::{FfprobeProber, Prober, SourceInfo};
pub use tools::{check_tools, get_tool_path, require_tool, ToolInfo, FFMPEG, FFPROBE};
