use super::manifest::assemble_master;
use super::runner::{reset_dir, EncoderRunner, RenditionJob, RenditionOutcome};
use super::{Result, StopRegistry, TranscodeError, TranscodeRequest};
use crate::config::Config;
use crate::ladder::{quality_label, select_presets, QualityCatalog};
use crate::status::{JobStatus, RenditionPatch, RenditionStatus, StatusStore, ORIGINAL_LABEL};
use chrono::Utc;
use futures::FutureExt;
use hlsforge_av::{compute_scale, get_tool_path, FfprobeProber, Prober, SourceInfo, FFMPEG, FFPROBE};
use hlsforge_common::paths::{resolve_source, JobLayout};
use hlsforge_common::{JobId, OverallState, RenditionState};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runtime knobs for the orchestrator, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_parallel_encodes: usize,
    pub per_job_concurrency: usize,
    pub stop_grace: Duration,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_dir: config.storage.upload_dir.clone(),
            output_dir: config.storage.output_dir.clone(),
            max_parallel_encodes: config.transcode.max_parallel_encodes.max(1),
            per_job_concurrency: config.transcode.per_job_concurrency.max(1),
            stop_grace: config.transcode.stop_grace(),
            ffmpeg: resolve_tool(FFMPEG, config.tools.ffmpeg_path.as_deref()),
            ffprobe: resolve_tool(FFPROBE, config.tools.ffprobe_path.as_deref()),
        }
    }
}

fn resolve_tool(name: &str, configured: Option<&std::path::Path>) -> PathBuf {
    match get_tool_path(name, configured) {
        Ok(path) => path,
        Err(e) => {
            warn!("{}; jobs will fail until it is installed", e);
            PathBuf::from(name)
        }
    }
}

/// Runs transcode jobs: probe, select, fan out one encoder per rendition,
/// then finalize the record and master manifest.
///
/// Cheap to clone; every clone shares the same pool, stop registry, and
/// set of active jobs.
#[derive(Clone)]
pub struct Orchestrator {
    settings: Arc<OrchestratorSettings>,
    catalog: Arc<QualityCatalog>,
    store: Arc<StatusStore>,
    prober: Arc<dyn Prober>,
    runner: EncoderRunner,
    pool: Arc<Semaphore>,
    stops: StopRegistry,
    active: Arc<Mutex<HashSet<JobId>>>,
}

/// Marks a job as running until dropped.
struct ActiveGuard {
    active: Arc<Mutex<HashSet<JobId>>>,
    job_id: JobId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.job_id);
    }
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        catalog: QualityCatalog,
        prober: Arc<dyn Prober>,
    ) -> Self {
        let store = Arc::new(StatusStore::new(&settings.output_dir));
        let runner = EncoderRunner::new(&settings.ffmpeg, store.clone(), settings.stop_grace);
        let pool = Arc::new(Semaphore::new(settings.max_parallel_encodes.max(1)));

        Self {
            settings: Arc::new(settings),
            catalog: Arc::new(catalog),
            store,
            prober,
            runner,
            pool,
            stops: StopRegistry::new(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Build an orchestrator probing with the configured ffprobe.
    pub fn from_config(config: &Config) -> Self {
        let settings = OrchestratorSettings::from_config(config);
        let prober = Arc::new(FfprobeProber::new(&settings.ffprobe));
        Self::new(settings, config.catalog(), prober)
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    pub fn catalog(&self) -> &QualityCatalog {
        &self.catalog
    }

    pub fn is_active(&self, job_id: &JobId) -> bool {
        self.active.lock().contains(job_id)
    }

    pub fn request_stop(&self, job_id: &JobId) {
        self.stops.request_stop(job_id);
    }

    pub async fn status(&self, job_id: &JobId) -> Result<Option<JobStatus>> {
        Ok(self.store.read(job_id).await?)
    }

    /// Check a request before anything is launched for it.
    pub fn validate(&self, req: &TranscodeRequest) -> Result<PathBuf> {
        let source = resolve_source(&self.settings.upload_dir, &req.source_filename)
            .map_err(|e| TranscodeError::InvalidRequest(e.to_string()))?;
        if !source.is_file() {
            return Err(TranscodeError::SourceMissing(source));
        }
        Ok(source)
    }

    /// Launch a job in the background on behalf of an external caller.
    ///
    /// A stop left over from an earlier run of the same job is cleared first.
    pub fn trigger(&self, req: TranscodeRequest) -> Result<JoinHandle<Result<JobStatus>>> {
        let source = self.validate(&req)?;
        let guard = self.claim(&req.job_id)?;
        self.stops.reset(&req.job_id);
        Ok(self.launch(req, source, guard))
    }

    /// Launch a job in the background, honouring any pending stop.
    pub fn spawn(&self, req: TranscodeRequest) -> Result<JoinHandle<Result<JobStatus>>> {
        let source = self.validate(&req)?;
        let guard = self.claim(&req.job_id)?;
        Ok(self.launch(req, source, guard))
    }

    /// Run a job to completion on the current task.
    pub async fn run(&self, req: TranscodeRequest) -> Result<JobStatus> {
        let source = self.validate(&req)?;
        let guard = self.claim(&req.job_id)?;
        self.run_claimed(req, source, guard).await
    }

    fn launch(
        &self,
        req: TranscodeRequest,
        source: PathBuf,
        guard: ActiveGuard,
    ) -> JoinHandle<Result<JobStatus>> {
        let this = self.clone();
        tokio::spawn(async move { this.run_claimed(req, source, guard).await })
    }

    fn claim(&self, job_id: &JobId) -> Result<ActiveGuard> {
        let mut active = self.active.lock();
        if !active.insert(job_id.clone()) {
            return Err(TranscodeError::AlreadyRunning(job_id.clone()));
        }
        Ok(ActiveGuard {
            active: self.active.clone(),
            job_id: job_id.clone(),
        })
    }

    async fn run_claimed(
        &self,
        req: TranscodeRequest,
        source: PathBuf,
        _guard: ActiveGuard,
    ) -> Result<JobStatus> {
        let job_id = req.job_id.clone();
        let cancel = self.stops.token(&job_id);

        let result = self.execute(&req, source, cancel).await;
        self.stops.reset(&job_id);

        match result {
            Ok(status) => {
                info!(
                    "Job {} finished: {} (manifest: {})",
                    job_id,
                    status.overall_state,
                    status.master_manifest_name.as_deref().unwrap_or("none")
                );
                Ok(status)
            }
            Err(err) => {
                error!("Job {} failed: {}", job_id, err);
                self.record_failure(&job_id, &err).await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        req: &TranscodeRequest,
        source: PathBuf,
        cancel: CancellationToken,
    ) -> Result<JobStatus> {
        let job_id = &req.job_id;
        let layout = self.store.layout(job_id);

        if cancel.is_cancelled() {
            info!("Job {} was stopped before it started", job_id);
            let status = self
                .store
                .update(job_id, |status| {
                    status.source_filename = req.source_filename.clone();
                    status.overall_state = OverallState::Stopped;
                    status.finished_at = Some(Utc::now());
                })
                .await?;
            return Ok(status);
        }

        match self.store.read(job_id).await {
            Ok(Some(existing)) if existing.overall_state == OverallState::Ok => {
                info!("Job {} already complete, nothing to do", job_id);
                return Ok(existing);
            }
            Ok(_) => {}
            Err(e) => warn!("Ignoring unreadable status for job {}: {}", job_id, e),
        }

        let info = match self.prober.try_probe(&source).await {
            Ok(info) => info,
            Err(source_err) => {
                let err = TranscodeError::ProbeFailure {
                    path: source.clone(),
                    source: source_err,
                };
                warn!("{}; encoding the full catalog", err);
                SourceInfo::UNKNOWN
            }
        };

        let selection = select_presets(
            &self.catalog,
            info.height,
            req.renditions.as_deref(),
            req.network_mbps,
        );
        info!(
            "Job {}: source {}, encoding {:?}, skipping {:?}",
            job_id,
            info.resolution(),
            selection.selected_labels(),
            selection.skipped_labels()
        );

        let now = Utc::now();
        let mut status = JobStatus::new(job_id.clone());
        status.source_filename = req.source_filename.clone();
        status.started_at = Some(now);
        status.overall_state = OverallState::Running;
        status.requested_renditions = req.renditions.clone();
        status.network_mbps = req.network_mbps;
        if info.resolution().is_known() {
            status.original_resolution = Some(info.resolution());
            status.original_quality_label = Some(quality_label(info.height).to_string());
        }
        for preset in &selection.selected {
            let mut entry = RenditionStatus::with_state(RenditionState::Queued);
            entry.target_resolution = Some(compute_scale(info.resolution(), preset.resolution()));
            entry.updated_at = Some(now);
            status.renditions.insert(preset.label.clone(), entry);
        }
        for preset in &selection.skipped {
            let mut entry = RenditionStatus::with_state(RenditionState::Skipped);
            entry.updated_at = Some(now);
            status.renditions.insert(preset.label.clone(), entry);
        }
        let mut original = RenditionStatus::with_state(RenditionState::Ok);
        original.progress_percent = 100;
        original.output_relative_path = Some(req.source_filename.clone());
        original.target_resolution = status.original_resolution;
        original.updated_at = Some(now);
        status.renditions.insert(ORIGINAL_LABEL.to_string(), original);

        self.store.write(job_id, &status).await?;

        match tokio::fs::remove_file(layout.master_manifest_path()).await {
            Ok(()) => debug!("Removed previous master manifest for job {}", job_id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove old master manifest for {}: {}", job_id, e),
        }

        let per_job = Arc::new(Semaphore::new(
            self.settings
                .per_job_concurrency
                .min(selection.selected.len())
                .max(1),
        ));
        let mut tasks: JoinSet<(String, RenditionOutcome)> = JoinSet::new();

        for preset in selection.selected {
            let label = preset.label.clone();

            if let Err(e) = reset_dir(&layout.rendition_dir(&label)).await {
                error!("Could not prepare output for {}/{}: {}", job_id, label, e);
                self.note_failure(job_id, &label, &format!("preparing output directory: {}", e))
                    .await;
                continue;
            }
            if let Err(e) = self
                .store
                .merge_rendition(job_id, &label, RenditionPatch::state(RenditionState::Starting))
                .await
            {
                warn!("Failed to record start of {}/{}: {}", job_id, label, e);
            }

            let job = RenditionJob {
                job_id: job_id.clone(),
                source: source.clone(),
                layout: layout.clone(),
                preset: preset.clone(),
                source_info: info,
                cancel: cancel.clone(),
            };
            let runner = self.runner.clone();
            let pool = self.pool.clone();
            let per_job = per_job.clone();

            tasks.spawn(async move {
                let work = async move {
                    let _job_permit = per_job.acquire_owned().await.map_err(|e| {
                        TranscodeError::Orchestration(format!("per-job limiter closed: {}", e))
                    })?;
                    let _pool_permit = pool.acquire_owned().await.map_err(|e| {
                        TranscodeError::Orchestration(format!("encoder pool closed: {}", e))
                    })?;
                    Ok::<_, TranscodeError>(runner.run(job).await)
                };

                let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(err)) => RenditionOutcome::Failed(err),
                    Err(panic) => RenditionOutcome::Failed(TranscodeError::Orchestration(
                        format!("rendition worker panicked: {}", panic_message(&*panic)),
                    )),
                };
                (label, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (label, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Rendition task for job {} was lost: {}", job_id, e);
                    continue;
                }
            };

            debug!(
                "Rendition {}/{} finished with exit code {:?}",
                job_id,
                label,
                outcome.exit_code()
            );
            if let Some(text) = outcome.error_text() {
                self.note_failure(job_id, &label, &text).await;
            }
        }

        self.finalize(&layout, job_id).await
    }

    /// Make sure a rendition that did not succeed carries an error message,
    /// and is in a terminal state.
    async fn note_failure(&self, job_id: &JobId, label: &str, message: &str) {
        let result = self
            .store
            .update(job_id, |status| {
                let now = Utc::now();
                let entry = status.renditions.entry(label.to_string()).or_default();
                if entry.error_message.is_none() {
                    entry.error_message = Some(message.to_string());
                }
                if !entry.state.is_terminal() {
                    entry.state = RenditionState::Error;
                    entry.finished_at = Some(now);
                }
                entry.updated_at = Some(now);
            })
            .await;

        if let Err(e) = result {
            warn!("Failed to record failure of {}/{}: {}", job_id, label, e);
        }
    }

    async fn finalize(&self, layout: &JobLayout, job_id: &JobId) -> Result<JobStatus> {
        let now = Utc::now();
        let status = self
            .store
            .update(job_id, |status| {
                if !status.all_terminal() {
                    warn!("Job {} has renditions without a final state", job_id);
                }
                status.fail_unfinished("rendition did not reach a final state", now);
                status.overall_state = status.reduce_overall();
                status.finished_at = Some(now);
            })
            .await
            .map_err(|e| TranscodeError::Finalization(e.to_string()))?;

        let manifest = assemble_master(&self.catalog, layout, &status)
            .await
            .map_err(|e| match e {
                TranscodeError::Finalization(_) => e,
                other => TranscodeError::Finalization(other.to_string()),
            })?;

        self.store
            .update(job_id, |status| status.master_manifest_name = manifest)
            .await
            .map_err(|e| TranscodeError::Finalization(e.to_string()))
    }

    /// Leave a degraded record behind after a job-level failure.
    async fn record_failure(&self, job_id: &JobId, err: &TranscodeError) {
        let message = err.to_string();
        let result = self
            .store
            .update(job_id, |status| {
                let now = Utc::now();
                status.fail_unfinished(&message, now);
                status.overall_state = OverallState::Error;
                status.error_message = Some(message.clone());
                status.finished_at = Some(now);
            })
            .await;

        if let Err(e) = result {
            error!("Could not record failure of job {}: {}", job_id, e);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
