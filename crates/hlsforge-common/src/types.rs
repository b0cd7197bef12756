//! Core state enums and value types shared across hlsforge.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single rendition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenditionState {
    #[default]
    Queued,
    Starting,
    Running,
    Ok,
    Error,
    Skipped,
    Stopped,
}

impl RenditionState {
    /// Terminal states are never left once reached within a job run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Error | Self::Skipped | Self::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for RenditionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall state of a job.
///
/// Records written by other versions may carry states this build does not
/// know; those deserialize as [`OverallState::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallState {
    Running,
    Ok,
    Error,
    Stopped,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OverallState {
    /// Reduce rendition states to an overall state.
    ///
    /// Any stopped rendition makes the job stopped; otherwise any error (or
    /// a rendition that never reached a terminal state) makes it an error;
    /// otherwise it is ok.
    pub fn reduce<I>(states: I) -> Self
    where
        I: IntoIterator<Item = RenditionState>,
    {
        let mut errored = false;
        for state in states {
            match state {
                RenditionState::Stopped => return Self::Stopped,
                RenditionState::Ok | RenditionState::Skipped => {}
                _ => errored = true,
            }
        }
        if errored {
            Self::Error
        } else {
            Self::Ok
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for OverallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are known.
    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
