use crate::ladder::{default_presets, QualityCatalog, RenditionPreset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// The active rendition ladder: the configured override, or the
    /// built-in presets.
    pub fn catalog(&self) -> QualityCatalog {
        QualityCatalog::new(
            self.transcode
                .presets
                .clone()
                .unwrap_or_else(default_presets),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory uploaded sources are read from
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Root of the per-job output namespaces
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./hls")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Encoder processes allowed at once across all jobs (default: 4)
    #[serde(default = "default_max_parallel")]
    pub max_parallel_encodes: usize,

    /// Encoder processes allowed at once within one job (default: 4)
    #[serde(default = "default_max_parallel")]
    pub per_job_concurrency: usize,

    /// Seconds an encoder gets to quit after a stop request before it is
    /// killed (default: 5)
    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: u64,

    /// Relaunch incomplete jobs when the server starts (default: true)
    #[serde(default = "default_true")]
    pub recover_on_start: bool,

    /// Replaces the built-in rendition ladder when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets: Option<Vec<RenditionPreset>>,
}

fn default_max_parallel() -> usize {
    4
}
fn default_stop_grace() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

impl TranscodeConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            max_parallel_encodes: default_max_parallel(),
            per_job_concurrency: default_max_parallel(),
            stop_grace_secs: default_stop_grace(),
            recover_on_start: true,
            presets: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}
