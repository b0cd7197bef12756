use dashmap::DashMap;
use hlsforge_common::JobId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-job cooperative stop signals.
///
/// A stop requested before a job starts leaves a cancelled token behind, so
/// the run notices it as soon as it begins. Tokens are dropped when a run
/// ends.
#[derive(Debug, Clone, Default)]
pub struct StopRegistry {
    tokens: Arc<DashMap<JobId, CancellationToken>>,
}

impl StopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The job's token, created on first use.
    pub fn token(&self, job_id: &JobId) -> CancellationToken {
        self.tokens.entry(job_id.clone()).or_default().clone()
    }

    pub fn request_stop(&self, job_id: &JobId) {
        tracing::info!("Stop requested for job {}", job_id);
        self.token(job_id).cancel();
    }

    /// Forget the job's token, clearing any stale stop request.
    pub fn reset(&self, job_id: &JobId) {
        self.tokens.remove(job_id);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_before_start_is_remembered() {
        let stops = StopRegistry::new();
        let id = JobId::new("j").unwrap();

        assert!(stops.is_empty());
        stops.request_stop(&id);
        assert_eq!(stops.len(), 1);
        assert!(stops.token(&id).is_cancelled());
    }

    #[test]
    fn test_token_shared_until_reset() {
        let stops = StopRegistry::new();
        let id = JobId::new("j").unwrap();

        let token = stops.token(&id);
        stops.request_stop(&id);
        assert!(token.is_cancelled());

        stops.reset(&id);
        assert!(stops.is_empty());
        assert!(!stops.token(&id).is_cancelled());
    }
}
