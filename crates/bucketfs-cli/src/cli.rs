use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bucketfs",
    about = "Folders and confined paths over a flat object store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Client configuration file (TOML)
    #[arg(short, long, global = true, default_value = "bucketfs.toml")]
    pub config: PathBuf,

    /// Create the configured bucket if it does not exist yet
    #[arg(long, global = true)]
    pub create_bucket: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload a local file
    Put(PutArgs),
    /// Download an object
    Get(GetArgs),
    /// Show object metadata
    Stat(PathArgs),
    /// Remove an object
    Rm(PathArgs),
    /// List objects under a prefix
    Ls(LsArgs),
    /// Create a folder
    Mkdir(PathArgs),
    /// Remove a folder and everything under it
    Rmdir(PathArgs),
    /// List folders under a prefix
    Folders(FoldersArgs),
    /// Check whether a folder exists
    Exists(PathArgs),
    /// Copy an object
    Cp(CpArgs),
    /// Print the public URL of an object
    Url(PathArgs),
}

#[derive(Args)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Args)]
pub struct PutArgs {
    /// Local file to upload
    pub local: PathBuf,
    /// Destination path in the bucket
    pub path: String,
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub path: String,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "")]
    pub prefix: String,
    #[arg(short, long)]
    pub recursive: bool,
    /// Include folder marker objects
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Args)]
pub struct FoldersArgs {
    #[arg(default_value = "")]
    pub prefix: String,
}

#[derive(Args)]
pub struct CpArgs {
    pub src: String,
    pub dest: String,
}
