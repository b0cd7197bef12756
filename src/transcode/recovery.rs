use super::{Orchestrator, Result, TranscodeError, TranscodeRequest};
use hlsforge_common::paths::resolve_source;
use hlsforge_common::{JobId, OverallState};
use tracing::{debug, info, warn};

/// Relaunch every job left incomplete by a previous process.
///
/// Jobs that are running, errored, or in an unknown state are resumed in
/// the background with the rendition subset and network hint they were
/// triggered with, provided the source is still present. Completed and
/// deliberately stopped jobs are left alone. Returns the relaunched ids.
pub async fn recover_incomplete(orchestrator: &Orchestrator) -> Result<Vec<JobId>> {
    let store = orchestrator.store();
    let upload_dir = &orchestrator.settings().upload_dir;
    let mut relaunched = Vec::new();

    for job_id in store.list_job_ids().await? {
        let status = match store.read(&job_id).await {
            Ok(Some(status)) => status,
            Ok(None) => continue,
            Err(e) => {
                warn!("Recovery: skipping unreadable status for {}: {}", job_id, e);
                continue;
            }
        };

        match status.overall_state {
            OverallState::Running | OverallState::Error | OverallState::Unknown => {}
            OverallState::Ok | OverallState::Stopped => {
                debug!("Recovery: job {} is {}, leaving it", job_id, status.overall_state);
                continue;
            }
        }

        if status.source_filename.is_empty() {
            warn!("Recovery: job {} has no source recorded", job_id);
            continue;
        }
        match resolve_source(upload_dir, &status.source_filename) {
            Ok(path) if path.is_file() => {}
            _ => {
                warn!(
                    "Recovery: source {:?} for job {} is gone",
                    status.source_filename, job_id
                );
                continue;
            }
        }

        let mut req = TranscodeRequest::new(job_id.clone(), status.source_filename.clone());
        req.renditions = status.requested_renditions.clone();
        req.network_mbps = status.network_mbps;

        match orchestrator.spawn(req) {
            Ok(_handle) => {
                info!(
                    "Recovery: relaunched job {} (was {})",
                    job_id, status.overall_state
                );
                relaunched.push(job_id);
            }
            Err(TranscodeError::AlreadyRunning(_)) => {
                debug!("Recovery: job {} is already running", job_id);
            }
            Err(e) => warn!("Recovery: could not relaunch job {}: {}", job_id, e),
        }
    }

    if !relaunched.is_empty() {
        info!("Recovery sweep relaunched {} job(s)", relaunched.len());
    }
    Ok(relaunched)
}
