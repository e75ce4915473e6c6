use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pixluna")]
#[command(author, version, about = "Random illustration fetcher")]
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
    /// Fetch a batch of random images
    Fetch {
        /// Tag query, comma or slash separated
        tag: Option<String>,

        /// Number of images (at most 10)
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Source alias; picks from the configured defaults when omitted
        #[arg(short, long)]
        source: Option<String>,

        /// Directory to write images to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Fetch a Pixiv work by id (requires pixiv.php_sessid)
    Pixiv {
        /// Pixiv artwork id
        pid: String,

        /// Zero-based page index
        #[arg(short, long, default_value = "0")]
        page: u32,

        /// Fetch every page of the work
        #[arg(long)]
        all: bool,

        /// Directory to write images to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// List registered image sources
    Sources,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
