use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hlsforge")]
#[command(author, version, about = "Adaptive-bitrate HLS transcoding service")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recover interrupted jobs, then serve the HTTP API
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Transcode one uploaded source in the foreground
    Transcode {
        /// Source file, relative to the upload directory
        #[arg(required = true)]
        source: String,

        /// Job id (generated if omitted)
        #[arg(long)]
        job_id: Option<String>,

        /// Only encode these renditions
        #[arg(long, value_delimiter = ',')]
        renditions: Vec<String>,

        /// Client bandwidth hint in Mbps
        #[arg(long)]
        network_mbps: Option<f64>,
    },

    /// Print the stored status of a job
    Status {
        /// Job id
        #[arg(required = true)]
        job_id: String,
    },

    /// Probe a media file and display its resolution and duration
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the active rendition ladder
    Presets,

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcode() {
        let cli = Cli::try_parse_from([
            "hlsforge",
            "transcode",
            "movie.mp4",
            "--renditions",
            "720p,480p",
            "--network-mbps",
            "3.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Transcode {
                source,
                job_id,
                renditions,
                network_mbps,
            } => {
                assert_eq!(source, "movie.mp4");
                assert!(job_id.is_none());
                assert_eq!(renditions, ["720p", "480p"]);
                assert_eq!(network_mbps, Some(3.5));
            }
            _ => panic!("expected transcode"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli =
            Cli::try_parse_from(["hlsforge", "status", "job-1", "-v", "-c", "/tmp/x.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }
}
