//! Job identifiers.
//!
//! A [`JobId`] names the namespace that holds every artifact of a job: its
//! status record, rendition directories, and master manifest. Because it is
//! joined onto the output directory, it is validated to be a single safe path
//! component on construction and on deserialization.

use crate::paths::is_safe_component;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length of a job identifier.
pub const MAX_JOB_ID_LEN: usize = 128;

/// Identifier for one transcode job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Validate and wrap an identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.len() > MAX_JOB_ID_LEN {
            return Err(Error::invalid_input(format!(
                "job id longer than {} characters",
                MAX_JOB_ID_LEN
            )));
        }
        if !is_safe_component(&id) {
            return Err(Error::invalid_input(format!("invalid job id: {:?}", id)));
        }
        Ok(Self(id))
    }

    /// Generate a new random job ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_ids() {
        for id in ["abc", "lecture-01", "v1.2_final", "A"] {
            assert!(JobId::new(id).is_ok(), "{id} should be accepted");
        }
    }

    #[test]
    fn test_rejects_unsafe_ids() {
        for id in ["", ".", "..", "a/b", "../etc", "a b", "a\\b", "naïve"] {
            assert!(JobId::new(id).is_err(), "{id:?} should be rejected");
        }
        assert!(JobId::new("x".repeat(MAX_JOB_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_generate_is_valid_and_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert!(JobId::new(a.as_str()).is_ok());
    }

    #[test]
    fn test_serde_is_transparent_and_validated() {
        let id = JobId::new("job-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"job-1\"");

        let parsed: JobId = serde_json::from_str("\"job-1\"").unwrap();
        assert_eq!(parsed, id);

        assert!(serde_json::from_str::<JobId>("\"../x\"").is_err());
    }
}
