//! hlsforge-common: Shared types, identifiers, and layout helpers.
//!
//! This crate provides the vocabulary shared by every hlsforge component:
//!
//! - **Job IDs**: A validated identifier that is always a safe path component
//! - **States**: Rendition and overall job states, plus the overall reduction
//! - **Paths**: The on-disk layout of a job namespace
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use hlsforge_common::{JobId, OverallState, RenditionState};
//! use hlsforge_common::paths::JobLayout;
//! use std::path::Path;
//!
//! let job_id: JobId = "lecture-01".parse().unwrap();
//! let layout = JobLayout::new(Path::new("/srv/hls"), &job_id);
//! assert!(layout.status_path().ends_with("lecture-01/status.json"));
//!
//! let overall = OverallState::reduce([RenditionState::Ok, RenditionState::Stopped]);
//! assert_eq!(overall, OverallState::Stopped);
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
