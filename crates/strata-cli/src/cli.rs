use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: composable key-value store pipelines",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log store calls at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the default pipeline configuration as TOML
    Config,
    /// Show which shard a key routes to
    Hash(HashArgs),
    /// Build a pipeline over in-memory stores and run operations against it
    Run(RunArgs),
}

#[derive(Args)]
pub struct HashArgs {
    pub key: String,
    #[arg(long, default_value = "2")]
    pub shards: usize,
}

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Print metrics in the Prometheus text format instead of JSON
    #[arg(long)]
    pub prometheus: bool,
    /// Operations: `set:KEY=VALUE`, `get:KEY`, `del:KEY`
    #[arg(required = true)]
    pub ops: Vec<String>,
}
