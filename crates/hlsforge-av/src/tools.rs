//! External tool detection and management.

use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Information about an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a program is available using a custom version argument.
///
/// `program` may be a bare name (looked up on `PATH`) or a full path.
pub fn check_tool_with_arg(name: &str, program: &Path, version_arg: &str) -> ToolInfo {
    let result = Command::new(program).arg(version_arg).output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            let path = which::which(program).ok();

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path,
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check ffmpeg and ffprobe, honouring configured paths.
///
/// # Example
///
/// ```no_run
/// use hlsforge_av::check_tools;
///
/// for tool in check_tools(None, None) {
///     println!("{}: {}", tool.name, tool.available);
/// }
/// ```
pub fn check_tools(ffmpeg_path: Option<&Path>, ffprobe_path: Option<&Path>) -> Vec<ToolInfo> {
    [(FFMPEG, ffmpeg_path), (FFPROBE, ffprobe_path)]
        .into_iter()
        .map(|(name, configured)| {
            let program = configured.unwrap_or_else(|| Path::new(name));
            check_tool_with_arg(name, program, "-version")
        })
        .collect()
}

/// Require that a tool is available, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            "Configured {} path {:?} does not exist, falling back to PATH",
            name,
            path
        );
    }

    require_tool(name)
}
