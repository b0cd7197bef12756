mod cli;

use hlsforge::{
    config, server,
    transcode::{recover_incomplete, Orchestrator, TranscodeRequest},
};
use hlsforge_av::{FfprobeProber, Prober};
use hlsforge_common::JobId;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting hlsforge server");
    tracing::info!(
        "Uploads from {:?}, HLS output to {:?}",
        config.storage.upload_dir,
        config.storage.output_dir
    );

    tokio::fs::create_dir_all(&config.storage.output_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", config.storage.output_dir))?;

    let orchestrator = Orchestrator::from_config(&config);

    if config.transcode.recover_on_start {
        match recover_incomplete(&orchestrator).await {
            Ok(ids) if !ids.is_empty() => {
                tracing::info!("Resumed {} interrupted job(s)", ids.len());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Recovery sweep failed: {}", e),
        }
    }

    server::start_server(config, orchestrator).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsforge=trace,hlsforge_av=trace,hlsforge_common=debug,tower_http=debug".to_string()
        } else {
            "hlsforge=debug,hlsforge_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Transcode {
            source,
            job_id,
            renditions,
            network_mbps,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(transcode(
                source,
                job_id,
                renditions,
                network_mbps,
                cli.config.as_deref(),
            ))
        }
        Commands::Status { job_id } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(show_status(&job_id, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::Presets => list_presets(cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn transcode(
    source: String,
    job_id: Option<String>,
    renditions: Vec<String>,
    network_mbps: Option<f64>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let orchestrator = Orchestrator::from_config(&config);

    let job_id = match job_id {
        Some(id) => JobId::new(id)?,
        None => JobId::generate(),
    };
    let mut req = TranscodeRequest::new(job_id.clone(), source);
    if !renditions.is_empty() {
        req = req.with_renditions(renditions);
    }
    if let Some(mbps) = network_mbps {
        req = req.with_network_mbps(mbps);
    }

    tracing::info!("Transcoding job {}", job_id);
    let handle = orchestrator.trigger(req)?;

    // Ctrl+C stops the encoders gracefully; the job still finalizes.
    let interrupt = {
        let orchestrator = orchestrator.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping job {}", job_id);
                orchestrator.request_stop(&job_id);
            }
        })
    };

    let result = handle.await;
    interrupt.abort();

    let status = result.context("Transcode task failed")??;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn show_status(job_id: &str, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let store = hlsforge::status::StatusStore::new(&config.storage.output_dir);
    let job_id = JobId::new(job_id)?;

    match store.read(&job_id).await? {
        Some(status) => {
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        None => anyhow::bail!("No status recorded for job {}", job_id),
    }
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let ffprobe = hlsforge_av::get_tool_path("ffprobe", config.tools.ffprobe_path.as_deref())?;
    let info = FfprobeProber::new(ffprobe).try_probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let secs = info.duration_secs as u64;
        println!("File: {}", file.display());
        println!("Resolution: {}", info.resolution());
        println!(
            "Quality: {}",
            hlsforge::ladder::quality_label(info.height)
        );
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
    }

    Ok(())
}

fn list_presets(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    for preset in config.catalog().iter() {
        println!(
            "{:<6} {:>4}x{:<4} video {:>5}k (max {:>5}k) audio {:>3}k {} {}fps",
            preset.label,
            preset.width,
            preset.height,
            preset.video_bitrate,
            preset.max_bitrate,
            preset.audio_bitrate,
            preset.encoder_profile,
            preset.frame_rate
        );
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = hlsforge_av::check_tools(
        config.tools.ffmpeg_path.as_deref(),
        config.tools.ffprobe_path.as_deref(),
    );
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg and ffprobe are both required to transcode.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Upload dir: {:?}", config.storage.upload_dir);
            println!("  Output dir: {:?}", config.storage.output_dir);
            println!(
                "  Parallel encodes: {} ({} per job)",
                config.transcode.max_parallel_encodes, config.transcode.per_job_concurrency
            );
            println!("  Presets: {}", config.catalog().labels().join(", "));
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Presets: {}", config.catalog().labels().join(", "));
        }
    }

    Ok(())
}
