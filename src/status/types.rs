use chrono::{DateTime, Utc};
use hlsforge_common::{JobId, OverallState, RenditionState, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label of the synthetic entry describing the untouched source.
pub const ORIGINAL_LABEL: &str = "original";

/// Durable record of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    #[serde(default)]
    pub source_filename: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub overall_state: OverallState,
    #[serde(default)]
    pub original_resolution: Option<Resolution>,
    #[serde(default)]
    pub original_quality_label: Option<String>,
    #[serde(default)]
    pub renditions: BTreeMap<String, RenditionStatus>,
    #[serde(default)]
    pub master_manifest_name: Option<String>,
    /// Rendition subset the job was triggered with.
    #[serde(default)]
    pub requested_renditions: Option<Vec<String>>,
    /// Network hint the job was triggered with, in Mbps.
    #[serde(default)]
    pub network_mbps: Option<f64>,
    /// Job-level failure, separate from per-rendition errors.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl JobStatus {
    /// An empty record for a job.
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            source_filename: String::new(),
            started_at: None,
            finished_at: None,
            overall_state: OverallState::Unknown,
            original_resolution: None,
            original_quality_label: None,
            renditions: BTreeMap::new(),
            master_manifest_name: None,
            requested_renditions: None,
            network_mbps: None,
            error_message: None,
        }
    }

    pub fn rendition(&self, label: &str) -> Option<&RenditionStatus> {
        self.renditions.get(label)
    }

    /// Whether every rendition has reached a terminal state.
    pub fn all_terminal(&self) -> bool {
        self.renditions.values().all(|r| r.state.is_terminal())
    }

    /// Force every non-terminal rendition to error.
    pub fn fail_unfinished(&mut self, message: &str, now: DateTime<Utc>) {
        for rendition in self.renditions.values_mut() {
            if !rendition.state.is_terminal() {
                rendition.state = RenditionState::Error;
                rendition.error_message.get_or_insert_with(|| message.to_string());
                rendition.finished_at = Some(now);
                rendition.updated_at = Some(now);
            }
        }
    }

    /// Reduce the rendition states into the overall state.
    pub fn reduce_overall(&self) -> OverallState {
        OverallState::reduce(self.renditions.values().map(|r| r.state))
    }
}

/// Progress of one rendition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionStatus {
    #[serde(default)]
    pub state: RenditionState,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub target_resolution: Option<Resolution>,
    #[serde(default)]
    pub output_relative_path: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RenditionStatus {
    pub fn with_state(state: RenditionState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }
}

/// Partial update merged into a [`RenditionStatus`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenditionPatch {
    pub state: Option<RenditionState>,
    pub progress_percent: Option<u8>,
    pub target_resolution: Option<Resolution>,
    pub output_relative_path: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl RenditionPatch {
    pub fn state(state: RenditionState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn progress(mut self, percent: u8) -> Self {
        self.progress_percent = Some(percent.min(100));
        self
    }

    pub fn target(mut self, resolution: Resolution) -> Self {
        self.target_resolution = Some(resolution);
        self
    }

    pub fn output(mut self, relative_path: impl Into<String>) -> Self {
        self.output_relative_path = Some(relative_path.into());
        self
    }

    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn finished(mut self, at: DateTime<Utc>) -> Self {
        self.finished_at = Some(at);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Shallow-merge into `target`.
    ///
    /// An already-set `started_at` is kept, `updated_at` always moves to
    /// `now`, progress never decreases while running, and a transition to
    /// ok pins progress at 100.
    pub fn apply(self, target: &mut RenditionStatus, now: DateTime<Utc>) {
        if let Some(state) = self.state {
            target.state = state;
        }
        if let Some(percent) = self.progress_percent {
            if target.state != RenditionState::Running || percent >= target.progress_percent {
                target.progress_percent = percent;
            }
        }
        if target.state == RenditionState::Ok {
            target.progress_percent = 100;
        }
        if let Some(resolution) = self.target_resolution {
            target.target_resolution = Some(resolution);
        }
        if let Some(path) = self.output_relative_path {
            target.output_relative_path = Some(path);
        }
        if target.started_at.is_none() {
            target.started_at = self.started_at;
        }
        if let Some(at) = self.finished_at {
            target.finished_at = Some(at);
        }
        if let Some(message) = self.error_message {
            target.error_message = Some(message);
        }
        target.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_patch_keeps_started_at() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(5);
        let mut status = RenditionStatus::default();

        RenditionPatch::state(RenditionState::Running)
            .started(t0)
            .apply(&mut status, t0);
        RenditionPatch::default().started(t1).apply(&mut status, t1);

        assert_eq!(status.started_at, Some(t0));
        assert_eq!(status.updated_at, Some(t1));
    }

    #[test]
    fn test_progress_monotonic_while_running() {
        let now = Utc::now();
        let mut status = RenditionStatus::with_state(RenditionState::Running);

        RenditionPatch::default().progress(40).apply(&mut status, now);
        RenditionPatch::default().progress(30).apply(&mut status, now);
        assert_eq!(status.progress_percent, 40);

        RenditionPatch::default().progress(250).apply(&mut status, now);
        assert_eq!(status.progress_percent, 100);
    }

    #[test]
    fn test_ok_forces_full_progress() {
        let now = Utc::now();
        let mut status = RenditionStatus::with_state(RenditionState::Running);
        RenditionPatch::default().progress(97).apply(&mut status, now);
        RenditionPatch::state(RenditionState::Ok).apply(&mut status, now);
        assert_eq!(status.progress_percent, 100);
    }

    #[test]
    fn test_fail_unfinished() {
        let now = Utc::now();
        let mut job = JobStatus::new(JobId::new("j").unwrap());
        job.renditions
            .insert("720p".into(), RenditionStatus::with_state(RenditionState::Running));
        job.renditions
            .insert("480p".into(), RenditionStatus::with_state(RenditionState::Ok));
        assert!(!job.all_terminal());

        job.fail_unfinished("interrupted", now);

        assert!(job.all_terminal());
        let r = job.rendition("720p").unwrap();
        assert_eq!(r.state, RenditionState::Error);
        assert_eq!(r.error_message.as_deref(), Some("interrupted"));
        assert_eq!(job.rendition("480p").unwrap().error_message, None);
        assert_eq!(job.reduce_overall(), OverallState::Error);
    }

    #[test]
    fn test_status_json_round_trip_tolerates_missing_fields() {
        let json = r#"{"job_id":"abc","overall_state":"running",
                       "renditions":{"720p":{"state":"running","progress_percent":12}}}"#;
        let status: JobStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.overall_state, OverallState::Running);
        assert_eq!(status.rendition("720p").unwrap().progress_percent, 12);
        assert!(status.master_manifest_name.is_none());
    }
}
