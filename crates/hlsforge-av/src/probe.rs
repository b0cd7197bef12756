//! FFprobe-based source probing.
//!
//! Only the facts the rendition ladder needs are extracted: the first video
//! stream's dimensions and the container duration.

use crate::{Error, Result};
use async_trait::async_trait;
use hlsforge_common::Resolution;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Upper bound on a single ffprobe invocation.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Probed facts about a source file.
///
/// The all-zero value is the "unknown" sentinel returned when probing fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Container duration in seconds, `0.0` when unknown.
    pub duration_secs: f64,
}

impl SourceInfo {
    pub const UNKNOWN: SourceInfo = SourceInfo {
        width: 0,
        height: 0,
        duration_secs: 0.0,
    };

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn is_unknown(&self) -> bool {
        self.height == 0
    }
}

/// Something that can report a source's resolution and duration.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe a source, surfacing failures as errors.
    async fn try_probe(&self, path: &Path) -> Result<SourceInfo>;

    /// Probe a source, returning [`SourceInfo::UNKNOWN`] on any failure.
    async fn probe(&self, path: &Path) -> SourceInfo {
        match self.try_probe(path).await {
            Ok(info) => {
                tracing::debug!(
                    "Probed {:?}: {}x{} {:.2}s",
                    path,
                    info.width,
                    info.height,
                    info.duration_secs
                );
                info
            }
            Err(e) => {
                tracing::warn!("Probe of {:?} failed, treating as unknown: {}", path, e);
                SourceInfo::UNKNOWN
            }
        }
    }
}

/// [`Prober`] backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: PathBuf,
}

impl FfprobeProber {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn try_probe(&self, path: &Path) -> Result<SourceInfo> {
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }

        let child = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("ffprobe")
                } else {
                    Error::Io(e)
                }
            })?;

        let output = tokio::time::timeout(PROBE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::tool_failed("ffprobe", format!("timed out after {:?}", PROBE_TIMEOUT))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed("ffprobe", stderr.trim().to_string()));
        }

        let json_str = String::from_utf8(output.stdout)
            .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

        parse_ffprobe_json(&json_str)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Parse ffprobe's JSON output.
pub fn parse_ffprobe_json(json: &str) -> Result<SourceInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| Error::parse_error("ffprobe", "no video stream"))?;

    let duration_secs = output
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| parse_seconds(video.duration.as_deref()))
        .unwrap_or(0.0);

    Ok(SourceInfo {
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        duration_secs,
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}
