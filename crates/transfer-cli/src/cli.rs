//! CLI for the transfer block-pipeline.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use commands::{run_config, run_download, run_upload};

/// Top-level CLI for the transfer block-pipeline.
#[derive(Debug, Parser)]
#[command(name = "transfer")]
#[command(about = "Concurrent block-transfer pipeline for local files and HTTP(S) endpoints", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Upload method override, mirrored from `transfer_core::model::UploadMethod`
/// so clap can parse it without depending on the library's internal type.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum UploadMethodArg {
    Put,
    Post,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more files from HTTP(S) sources to local paths.
    Download {
        /// Remote URL to download.
        url: String,
        /// Local destination path.
        dest: std::path::PathBuf,
        /// Maximum number of parts dispatched concurrently.
        #[arg(long, value_name = "N")]
        max_concurrent: Option<usize>,
        /// Preferred part size in bytes (clamped to the required minimum).
        #[arg(long, value_name = "BYTES")]
        part_size: Option<u64>,
        /// Extra request header, "Key: Value" (repeatable).
        #[arg(long = "header", value_name = "KEY:VALUE")]
        headers: Vec<String>,
        /// Create the destination's parent directory tree if missing.
        #[arg(long)]
        mkdirs: bool,
    },

    /// Upload a local file, optionally split across multiple target URIs.
    Upload {
        /// Local source file path.
        src: std::path::PathBuf,
        /// Target URL(s); more than one triggers a multipart upload.
        #[arg(required = true)]
        url: Vec<String>,
        /// HTTP method used for each part.
        #[arg(long, value_enum, default_value = "put")]
        method: UploadMethodArg,
        /// Maximum number of parts dispatched concurrently.
        #[arg(long, value_name = "N")]
        max_concurrent: Option<usize>,
        /// Extra request header applied to every part, "Key: Value" (repeatable).
        #[arg(long = "header", value_name = "KEY:VALUE")]
        headers: Vec<String>,
        /// Extra request header applied only to multipart uploads, "Key: Value" (repeatable).
        #[arg(long = "multipart-header", value_name = "KEY:VALUE")]
        multipart_headers: Vec<String>,
    },

    /// Show the resolved configuration file path and its contents.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = transfer_core::config::load_or_init().unwrap_or_default();
        tracing::debug!(?cfg, "loaded config");

        match cli.command {
            CliCommand::Download { url, dest, max_concurrent, part_size, headers, mkdirs } => {
                run_download(&cfg, url, dest, max_concurrent, part_size, headers, mkdirs).await?
            }
            CliCommand::Upload { src, url, method, max_concurrent, headers, multipart_headers } => {
                run_upload(&cfg, src, url, method, max_concurrent, headers, multipart_headers).await?
            }
            CliCommand::Config => run_config()?,
        }

        Ok(())
    }
}
