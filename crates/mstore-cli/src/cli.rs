use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mstore",
    about = "Transactional message store: run scenarios and inspect behaviour profiles",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level (overridden by RUST_LOG)
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
    /// Run a JSON scenario script against a fresh in-memory store
    Run(RunArgs),
    /// Print the properties a save refuses to take from the client
    ReadOnlyTags(ReadOnlyTagsArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the script
    pub script: PathBuf,
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Behaviour preset; replaces the configured behaviour
    #[arg(long)]
    pub profile: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum KindArg {
    Message,
    Attachment,
}

#[derive(Args)]
pub struct ReadOnlyTagsArgs {
    #[arg(long, default_value = "message")]
    pub kind: KindArg,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Behaviour preset (strict or legacy)
    #[arg(long)]
    pub profile: Option<String>,
    /// TOML configuration file to start from
    #[arg(long)]
    pub config: Option<PathBuf>,
}
