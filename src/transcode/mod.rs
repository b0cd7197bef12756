//! The transcoding pipeline: one encoder process per rendition, fanned out
//! by the orchestrator, finalized into a master manifest, and resumed by the
//! recovery sweep after a restart.

mod cancel;
mod manifest;
mod orchestrator;
mod recovery;
mod runner;

pub use cancel::StopRegistry;
pub use manifest::assemble_master;
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use recovery::recover_incomplete;
pub use runner::{EncoderRunner, RenditionJob, RenditionOutcome};

use hlsforge_common::JobId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, TranscodeError>;

/// Failures inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    /// The source could not be probed. The job continues with the full
    /// catalog.
    #[error("probe failed for {}: {source}", path.display())]
    ProbeFailure {
        path: PathBuf,
        #[source]
        source: hlsforge_av::Error,
    },

    /// The encoder process could not be started.
    #[error("failed to launch encoder for {label}: {source}")]
    EncoderLaunch {
        label: String,
        #[source]
        source: std::io::Error,
    },

    /// The encoder exited unsuccessfully.
    #[error("encoder for {label} exited with {}: {message}", describe_exit(exit_code))]
    EncoderRuntime {
        label: String,
        exit_code: Option<i32>,
        message: String,
    },

    /// The rendition was stopped on request.
    #[error("rendition {label} stopped at {progress}%")]
    Stopped { label: String, progress: u8 },

    /// Unexpected failure while fanning out renditions.
    #[error("orchestration failed: {0}")]
    Orchestration(String),

    /// Failure while computing the final state or writing the manifest.
    #[error("finalization failed: {0}")]
    Finalization(String),

    /// A run for this job is already in progress.
    #[error("job {0} is already running")]
    AlreadyRunning(JobId),

    /// The source file does not exist.
    #[error("source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The request itself is invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Status store failure.
    #[error("status store: {0}")]
    Status(#[from] hlsforge_common::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

impl TranscodeError {
    /// Text recorded in a rendition's `error_message`.
    pub fn status_message(&self) -> String {
        match self {
            Self::EncoderRuntime { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

/// A request to transcode one uploaded source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeRequest {
    pub job_id: JobId,
    /// Path relative to the upload directory.
    pub source_filename: String,
    #[serde(default)]
    pub renditions: Option<Vec<String>>,
    #[serde(default)]
    pub network_mbps: Option<f64>,
}

impl TranscodeRequest {
    pub fn new(job_id: JobId, source_filename: impl Into<String>) -> Self {
        Self {
            job_id,
            source_filename: source_filename.into(),
            renditions: None,
            network_mbps: None,
        }
    }

    pub fn with_renditions(mut self, labels: Vec<String>) -> Self {
        self.renditions = Some(labels);
        self
    }

    pub fn with_network_mbps(mut self, mbps: f64) -> Self {
        self.network_mbps = Some(mbps);
        self
    }
}
