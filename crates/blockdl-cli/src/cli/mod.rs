//! CLI for the blockdl block downloader.

mod commands;

use anyhow::Result;
use blockdl_core::config;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process::ExitCode;

use commands::{run_completions, run_get, run_scan, Overrides};

/// Top-level CLI for blockdl.
#[derive(Debug, Parser)]
#[command(name = "blockdl")]
#[command(about = "blockdl: resumable parallel block downloads over HTTP ranges", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL, resuming from an existing partial file.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Destination file. Defaults to a name derived from the server or URL, in the current directory.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Block size in KiB (overrides config).
        #[arg(long, value_name = "KIB")]
        block_size_kb: Option<u64>,

        /// Number of concurrent download workers (overrides config).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },

    /// Report which blocks of a destination file are present, without downloading.
    Scan {
        /// URL the file is downloaded from (used for its size and range support).
        url: String,

        /// Destination file to inspect.
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        /// Block size in KiB (overrides config).
        #[arg(long, value_name = "KIB")]
        block_size_kb: Option<u64>,
    },

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<ExitCode> {
        let cli = Cli::parse();

        if let CliCommand::Completions { shell } = cli.command {
            run_completions(shell);
            return Ok(ExitCode::SUCCESS);
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                output,
                block_size_kb,
                workers,
            } => {
                let overrides = Overrides {
                    block_size_kb,
                    workers,
                };
                run_get(&overrides.apply(&cfg)?, &url, output).await
            }
            CliCommand::Scan {
                url,
                output,
                block_size_kb,
            } => {
                let overrides = Overrides {
                    block_size_kb,
                    workers: None,
                };
                run_scan(&overrides.apply(&cfg)?, &url, output).await?;
                Ok(ExitCode::SUCCESS)
            }
            CliCommand::Completions { .. } => Ok(ExitCode::SUCCESS),
        }
    }
}
