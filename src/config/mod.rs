mod types;

pub use types::*;

use crate::status::ORIGINAL_LABEL;
use anyhow::{Context, Result};
use hlsforge_common::paths::is_safe_component;
use std::collections::HashSet;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./hlsforge.toml",
        "~/.config/hlsforge/config.toml",
        "/etc/hlsforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    // Validate server config
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    // Validate storage paths exist
    for (name, path) in [
        ("upload_dir", &config.storage.upload_dir),
        ("output_dir", &config.storage.output_dir),
    ] {
        if !path.exists() {
            tracing::warn!("Storage {} does not exist yet: {:?}", name, path);
        }
    }

    // Validate concurrency
    if config.transcode.max_parallel_encodes == 0 {
        anyhow::bail!("transcode.max_parallel_encodes must be at least 1");
    }
    if config.transcode.per_job_concurrency == 0 {
        anyhow::bail!("transcode.per_job_concurrency must be at least 1");
    }

    // Validate the rendition ladder
    if let Some(presets) = &config.transcode.presets {
        if presets.is_empty() {
            anyhow::bail!("transcode.presets is set but empty");
        }

        let mut seen = HashSet::new();
        for preset in presets {
            let label = &preset.label;
            if !is_safe_component(label) {
                anyhow::bail!("Preset label {:?} is not a valid directory name", label);
            }
            if label.eq_ignore_ascii_case(ORIGINAL_LABEL) {
                anyhow::bail!("Preset label {:?} is reserved", label);
            }
            if !seen.insert(label.to_ascii_lowercase()) {
                anyhow::bail!("Duplicate preset label {:?}", label);
            }
            if preset.width == 0 || preset.height == 0 {
                anyhow::bail!("Preset '{}' has a zero dimension", label);
            }
            if preset.width % 2 != 0 || preset.height % 2 != 0 {
                anyhow::bail!("Preset '{}' dimensions must be even", label);
            }
            if preset.video_bitrate == 0
                || preset.max_bitrate == 0
                || preset.buffer_size == 0
                || preset.audio_bitrate == 0
            {
                anyhow::bail!("Preset '{}' has a zero bitrate", label);
            }
            if preset.frame_rate == 0 || preset.segment_duration_s == 0 || preset.gop_size == 0 {
                anyhow::bail!(
                    "Preset '{}' needs a non-zero frame rate, segment duration, and GOP",
                    label
                );
            }
        }

        if presets.windows(2).any(|w| w[0].height < w[1].height) {
            anyhow::bail!("transcode.presets must be ordered by descending height");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.transcode.max_parallel_encodes, 4);
        assert_eq!(config.transcode.per_job_concurrency, 4);
        assert_eq!(config.transcode.stop_grace_secs, 5);
        assert!(config.transcode.recover_on_start);
        assert_eq!(config.catalog().len(), 5);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let file = write_config(
            r#"
            [storage]
            upload_dir = "/srv/uploads"

            [transcode]
            max_parallel_encodes = 2
            "#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.storage.upload_dir, Path::new("/srv/uploads"));
        assert_eq!(config.storage.output_dir, Path::new("./hls"));
        assert_eq!(config.transcode.max_parallel_encodes, 2);
        assert_eq!(config.transcode.per_job_concurrency, 4);
    }

    #[test]
    fn test_preset_override() {
        let file = write_config(
            r#"
            [[transcode.presets]]
            label = "540p"
            width = 960
            height = 540
            video_bitrate = 2000
            max_bitrate = 2140
            buffer_size = 4000
            audio_bitrate = 128
            encoder_profile = "main"

            [[transcode.presets]]
            label = "270p"
            width = 480
            height = 270
            video_bitrate = 400
            max_bitrate = 430
            buffer_size = 800
            audio_bitrate = 64
            encoder_profile = "baseline"
            "#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.catalog().labels(), ["540p", "270p"]);
    }

    #[test]
    fn test_rejects_invalid() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.transcode.max_parallel_encodes = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        let mut presets = crate::ladder::default_presets();
        presets.reverse();
        config.transcode.presets = Some(presets);
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        let mut presets = crate::ladder::default_presets();
        presets[1].label = "original".to_string();
        config.transcode.presets = Some(presets);
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        let mut presets = crate::ladder::default_presets();
        presets[0].label = "../up".to_string();
        config.transcode.presets = Some(presets);
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        let mut presets = crate::ladder::default_presets();
        presets[2].width = 1281;
        config.transcode.presets = Some(presets);
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.transcode.presets = Some(Vec::new());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_config(Path::new("/nonexistent/hlsforge.toml")).is_err());
    }
}
