use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::ENV_BASE_URL;

#[derive(Parser)]
#[command(name = "shrnk")]
#[command(version)]
#[command(about = "Compress, extract and shrink files with the shrnk processing service", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Service base URL (overrides the config file)
    #[arg(long, global = true, env = ENV_BASE_URL, value_name = "URL")]
    pub api_base: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compress files and directories into a ZIP archive
    Zip(ZipArgs),

    /// Extract every file of an archive
    Unzip(UnzipArgs),

    /// List the contents of an archive and optionally extract a selection
    Peek(PeekArgs),

    /// Resize images
    Resize(ResizeArgs),

    /// Remove EXIF metadata from images
    Strip(StripArgs),

    /// Download the result of a finished operation
    Download(DownloadArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared Arguments
// ============================================================================

#[derive(Args, Clone, Default)]
pub struct OutputArgs {
    /// Download the result into this directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Clone, Default)]
pub struct PasswordArgs {
    /// Archive password (leave out for no encryption)
    #[arg(short, long)]
    pub password: Option<String>,
}

// ============================================================================
// Archive Commands
// ============================================================================

#[derive(Args)]
pub struct ZipArgs {
    /// Files or directories to compress
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub password: PasswordArgs,

    /// Resize images before compressing: 50, 25 or <width>x<height>
    #[arg(short, long)]
    pub resize: Option<String>,

    /// Strip EXIF metadata from images before compressing
    #[arg(long)]
    pub strip_metadata: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct UnzipArgs {
    /// Archive to extract
    pub archive: PathBuf,

    #[command(flatten)]
    pub password: PasswordArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct PeekArgs {
    /// Archive to list
    pub archive: PathBuf,

    #[command(flatten)]
    pub password: PasswordArgs,

    /// Show only top-level entries
    #[arg(long)]
    pub collapsed: bool,

    /// Select an entry by path (repeatable)
    #[arg(short, long = "select", value_name = "PATH")]
    pub select: Vec<String>,

    /// Select every file
    #[arg(short, long, conflicts_with = "select")]
    pub all: bool,

    /// Pick entries interactively
    #[arg(short, long, conflicts_with_all = ["select", "all"])]
    pub interactive: bool,

    /// Extract the selected entries
    #[arg(short, long)]
    pub extract: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

// ============================================================================
// Image Commands
// ============================================================================

#[derive(Args)]
pub struct ResizeArgs {
    /// Images to resize
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Target size: 50, 25 or <width>x<height> (defaults to the config value)
    #[arg(short, long)]
    pub resize: Option<String>,

    /// Also strip EXIF metadata
    #[arg(long)]
    pub strip_metadata: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct StripArgs {
    /// Images to strip
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

// ============================================================================
// Download
// ============================================================================

#[derive(Clone, Copy, ValueEnum)]
pub enum ArtifactKind {
    Archive,
    Image,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Session id printed by a finished operation
    pub session_id: String,

    /// Service that produced the result
    #[arg(short, long, value_enum, default_value = "archive")]
    pub kind: ArtifactKind,

    /// Fetch a single output file (image results only)
    #[arg(long)]
    pub path: Option<String>,

    /// Directory to save into (defaults to the config value)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration and its file location
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
