//! On-disk layout of a job namespace.
//!
//! ```text
//! <output_dir>/<job_id>/status.json
//! <output_dir>/<job_id>/<label>/index.m3u8
//! <output_dir>/<job_id>/<label>/segment_000.ts
//! <output_dir>/<job_id>/master.m3u8
//! ```

use crate::{Error, JobId, Result};
use std::path::{Component, Path, PathBuf};

/// File name of the per-job status record.
pub const STATUS_FILE: &str = "status.json";

/// File name of the master manifest.
pub const MASTER_MANIFEST: &str = "master.m3u8";

/// File name of each rendition's sub-manifest.
pub const SUB_MANIFEST: &str = "index.m3u8";

/// Segment file name pattern handed to the encoder.
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// Check whether a string can be used verbatim as one path component.
///
/// Only ASCII letters, digits, `.`, `_` and `-` are allowed, and the name
/// may not be empty, `.` or `..`.
///
/// # Examples
///
/// ```
/// use hlsforge_common::paths::is_safe_component;
///
/// assert!(is_safe_component("720p"));
/// assert!(!is_safe_component(".."));
/// assert!(!is_safe_component("a/b"));
/// ```
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Resolve an uploaded source filename against the upload directory.
///
/// The filename must be relative and may not climb out of the upload
/// directory. Nested directories are allowed.
///
/// # Examples
///
/// ```
/// use hlsforge_common::paths::resolve_source;
/// use std::path::Path;
///
/// let path = resolve_source(Path::new("/uploads"), "course/intro.mp4").unwrap();
/// assert_eq!(path, Path::new("/uploads/course/intro.mp4"));
/// assert!(resolve_source(Path::new("/uploads"), "../secret.mp4").is_err());
/// ```
pub fn resolve_source(upload_dir: &Path, filename: &str) -> Result<PathBuf> {
    let relative = Path::new(filename);
    if filename.is_empty() {
        return Err(Error::invalid_input("source filename is empty"));
    }
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(Error::invalid_input(format!(
            "source filename must stay inside the upload directory: {}",
            filename
        )));
    }
    Ok(upload_dir.join(relative))
}

/// Paths belonging to one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    root: PathBuf,
}

impl JobLayout {
    pub fn new(output_dir: &Path, job_id: &JobId) -> Self {
        Self {
            root: output_dir.join(job_id.as_str()),
        }
    }

    /// The job namespace directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }

    pub fn master_manifest_path(&self) -> PathBuf {
        self.root.join(MASTER_MANIFEST)
    }

    pub fn rendition_dir(&self, label: &str) -> PathBuf {
        self.root.join(label)
    }

    pub fn sub_manifest_path(&self, label: &str) -> PathBuf {
        self.rendition_dir(label).join(SUB_MANIFEST)
    }

    pub fn segment_pattern(&self, label: &str) -> PathBuf {
        self.rendition_dir(label).join(SEGMENT_PATTERN)
    }

    /// Sub-manifest path relative to the job root, as referenced by the
    /// master manifest and the status record.
    pub fn sub_manifest_relative(label: &str) -> String {
        format!("{}/{}", label, SUB_MANIFEST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let id = JobId::new("job-7").unwrap();
        let layout = JobLayout::new(Path::new("/out"), &id);

        assert_eq!(layout.root(), Path::new("/out/job-7"));
        assert_eq!(layout.status_path(), Path::new("/out/job-7/status.json"));
        assert_eq!(
            layout.master_manifest_path(),
            Path::new("/out/job-7/master.m3u8")
        );
        assert_eq!(
            layout.sub_manifest_path("720p"),
            Path::new("/out/job-7/720p/index.m3u8")
        );
        assert_eq!(
            layout.segment_pattern("720p"),
            Path::new("/out/job-7/720p/segment_%03d.ts")
        );
        assert_eq!(JobLayout::sub_manifest_relative("720p"), "720p/index.m3u8");
    }

    #[test]
    fn test_resolve_source_rejects_escapes() {
        let dir = Path::new("/uploads");
        assert!(resolve_source(dir, "").is_err());
        assert!(resolve_source(dir, "/etc/passwd").is_err());
        assert!(resolve_source(dir, "a/../../b.mp4").is_err());
        assert!(resolve_source(dir, "./clip.mp4").is_ok());
    }
}
