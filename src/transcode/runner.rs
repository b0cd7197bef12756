use super::{Result, TranscodeError};
use crate::ladder::RenditionPreset;
use crate::status::{RenditionPatch, StatusStore};
use chrono::Utc;
use hlsforge_av::progress::{is_progress_line, parse_elapsed, percent};
use hlsforge_av::{compute_scale, HlsEncode, SourceInfo};
use hlsforge_common::paths::JobLayout;
use hlsforge_common::{JobId, RenditionState, Resolution};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Diagnostic lines kept for the error message of a failed encode.
const STDERR_TAIL_LINES: usize = 20;

/// Final result of one rendition run.
#[derive(Debug)]
pub enum RenditionOutcome {
    Succeeded,
    Failed(TranscodeError),
    Stopped { progress: u8 },
}

impl RenditionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Succeeded => Some(0),
            Self::Failed(TranscodeError::EncoderRuntime { exit_code, .. }) => *exit_code,
            _ => None,
        }
    }

    pub fn error_text(&self) -> Option<String> {
        match self {
            Self::Succeeded => None,
            Self::Failed(e) => Some(e.status_message()),
            Self::Stopped { progress } => Some(format!("stopped by request at {}%", progress)),
        }
    }
}

/// Everything one rendition run needs.
#[derive(Debug, Clone)]
pub struct RenditionJob {
    pub job_id: JobId,
    pub source: PathBuf,
    pub layout: JobLayout,
    pub preset: RenditionPreset,
    pub source_info: SourceInfo,
    pub cancel: CancellationToken,
}

impl RenditionJob {
    fn label(&self) -> &str {
        &self.preset.label
    }

    /// Output size after fitting the source into the preset's box.
    pub fn target_resolution(&self) -> Resolution {
        compute_scale(self.source_info.resolution(), self.preset.resolution())
    }
}

/// Drives one ffmpeg process per rendition and records its progress.
#[derive(Debug, Clone)]
pub struct EncoderRunner {
    ffmpeg: PathBuf,
    store: Arc<StatusStore>,
    stop_grace: Duration,
}

impl EncoderRunner {
    pub fn new(ffmpeg: impl Into<PathBuf>, store: Arc<StatusStore>, stop_grace: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            store,
            stop_grace,
        }
    }

    /// Encode one rendition. Every path ends with a terminal state merged
    /// into the job's status record.
    pub async fn run(&self, job: RenditionJob) -> RenditionOutcome {
        let label = job.label().to_string();
        let out_dir = job.layout.rendition_dir(&label);

        if job.cancel.is_cancelled() {
            self.merge(
                &job,
                RenditionPatch::state(RenditionState::Stopped).finished(Utc::now()),
            )
            .await;
            info!("Rendition {}/{} stopped before launch", job.job_id, label);
            return RenditionOutcome::Stopped { progress: 0 };
        }

        if let Err(e) = reset_dir(&out_dir).await {
            return self.fail(&job, TranscodeError::Io(e), 0).await;
        }

        let target = job.target_resolution();
        let args = HlsEncode {
            input: &job.source,
            output_dir: &out_dir,
            size: target,
            video_kbps: job.preset.video_bitrate,
            max_kbps: job.preset.max_bitrate,
            buffer_kbps: job.preset.buffer_size,
            audio_kbps: job.preset.audio_bitrate,
            frame_rate: job.preset.frame_rate,
            gop_size: job.preset.gop_size,
            segment_secs: job.preset.segment_duration_s,
            profile: &job.preset.encoder_profile,
            speed_preset: &job.preset.encoder_speed_preset,
        }
        .args();

        debug!("FFmpeg args for {}/{}: {:?}", job.job_id, label, args);

        let mut child = match Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                let err = TranscodeError::EncoderLaunch {
                    label: label.clone(),
                    source,
                };
                return self.fail(&job, err, 0).await;
            }
        };

        info!(
            "Encoding {} rendition {} at {} from {:?}",
            job.job_id, label, target, job.source
        );

        self.merge(
            &job,
            RenditionPatch::state(RenditionState::Running)
                .progress(0)
                .target(target)
                .started(Utc::now()),
        )
        .await;

        let mut progress = 0u8;
        match self.drive(&job, &mut child, &mut progress).await {
            Ok(()) => {
                self.merge(
                    &job,
                    RenditionPatch::state(RenditionState::Ok)
                        .progress(100)
                        .output(JobLayout::sub_manifest_relative(&label))
                        .finished(Utc::now()),
                )
                .await;
                info!("Rendition {}/{} complete", job.job_id, label);
                RenditionOutcome::Succeeded
            }
            Err(TranscodeError::Stopped { progress, .. }) => {
                self.merge(
                    &job,
                    RenditionPatch::state(RenditionState::Stopped)
                        .progress(progress)
                        .finished(Utc::now()),
                )
                .await;
                info!("Rendition {}/{} stopped at {}%", job.job_id, label, progress);
                RenditionOutcome::Stopped { progress }
            }
            Err(err) => {
                if let Err(e) = child.kill().await {
                    debug!("Encoder for {}/{} already gone: {}", job.job_id, label, e);
                }
                self.fail(&job, err, progress).await
            }
        }
    }

    /// Read diagnostics until the encoder exits.
    ///
    /// Lines are decoded lossily; undecodable bytes never fail an encode.
    async fn drive(&self, job: &RenditionJob, child: &mut Child, progress: &mut u8) -> Result<()> {
        let label = job.label();
        let stderr: ChildStderr = child.stderr.take().ok_or_else(|| {
            TranscodeError::Orchestration(format!("encoder stderr for {} not captured", label))
        })?;
        let mut segments = BufReader::new(stderr).split(b'\n');
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let total = job.source_info.duration_secs;

        loop {
            let segment = tokio::select! {
                biased;
                _ = job.cancel.cancelled() => {
                    self.stop_gracefully(child, job).await;
                    return Err(TranscodeError::Stopped {
                        label: label.to_string(),
                        progress: *progress,
                    });
                }
                segment = segments.next_segment() => segment?,
            };
            let Some(segment) = segment else {
                break;
            };
            // Metadata echoed by ffmpeg is not guaranteed to be UTF-8.
            let decoded = String::from_utf8_lossy(&segment);
            let line = decoded.trim_end_matches('\r');

            if let Some(pct) = parse_elapsed(line).and_then(|t| percent(t, total)) {
                if pct > *progress {
                    *progress = pct;
                    self.merge(job, RenditionPatch::default().progress(pct)).await;
                }
            } else if !is_progress_line(line) && !line.trim().is_empty() {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            }
        }

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }
        if job.cancel.is_cancelled() {
            return Err(TranscodeError::Stopped {
                label: label.to_string(),
                progress: *progress,
            });
        }

        Err(TranscodeError::EncoderRuntime {
            label: label.to_string(),
            exit_code: status.code(),
            message: Vec::from(tail).join("\n"),
        })
    }

    /// Ask ffmpeg to quit, then kill it if it outlives the grace period.
    async fn stop_gracefully(&self, child: &mut Child, job: &RenditionJob) {
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                debug!("Could not send quit to encoder: {}", e);
            }
            let _ = stdin.flush().await;
        }

        match tokio::time::timeout(self.stop_grace, child.wait()).await {
            Ok(_) => debug!("Encoder for {}/{} quit", job.job_id, job.label()),
            Err(_) => {
                warn!(
                    "Encoder for {}/{} ignored quit for {:?}, killing",
                    job.job_id,
                    job.label(),
                    self.stop_grace
                );
                if let Err(e) = child.kill().await {
                    error!("Failed to kill encoder: {}", e);
                }
            }
        }
    }

    async fn fail(&self, job: &RenditionJob, err: TranscodeError, progress: u8) -> RenditionOutcome {
        error!("Rendition {}/{} failed: {}", job.job_id, job.label(), err);
        self.merge(
            job,
            RenditionPatch::state(RenditionState::Error)
                .progress(progress)
                .error(err.status_message())
                .finished(Utc::now()),
        )
        .await;
        RenditionOutcome::Failed(err)
    }

    async fn merge(&self, job: &RenditionJob, patch: RenditionPatch) {
        if let Err(e) = self
            .store
            .merge_rendition(&job.job_id, job.label(), patch)
            .await
        {
            warn!(
                "Failed to record status for {}/{}: {}",
                job.job_id,
                job.label(),
                e
            );
        }
    }
}

/// Remove and recreate a rendition directory.
pub(super) async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}
