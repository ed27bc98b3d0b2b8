use std::str::FromStr;

use anyhow::{bail, Context};
use colored::Colorize;
use strata_middleware::shard_index;
use strata_store::Store;

use crate::cli::*;
use crate::config::{self, PipelineConfig};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Config => cmd_config(),
        Command::Hash(args) => cmd_hash(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn cmd_config() -> anyhow::Result<()> {
    let text = toml::to_string_pretty(&PipelineConfig::default())
        .context("rendering default configuration")?;
    print!("{text}");
    Ok(())
}

fn cmd_hash(args: HashArgs) -> anyhow::Result<()> {
    if args.shards == 0 {
        bail!("--shards must be at least 1");
    }
    let index = shard_index(&args.key, args.shards);
    println!(
        "{} -> shard {} of {}",
        args.key.bold(),
        index.to_string().yellow(),
        args.shards
    );
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let ops = args
        .ops
        .iter()
        .map(|raw| raw.parse::<Op>())
        .collect::<anyhow::Result<Vec<_>>>()?;
    let pipeline_config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let pipeline = config::build(&pipeline_config)?;

    for op in &ops {
        match op.apply(&*pipeline.store) {
            Ok(line) => println!("{} {}", "✓".green(), line),
            Err(err) => println!("{} {}: {}", "✗".red(), op, err.to_string().red()),
        }
    }

    match pipeline.store.close() {
        Ok(()) => println!("{} closed", "✓".green()),
        Err(err) => println!("{} close: {}", "✗".red(), err.to_string().red()),
    }

    println!("{}", "metrics".bold());
    if args.prometheus {
        let text = pipeline
            .metrics
            .render()
            .context("rendering metrics")?;
        print!("{text}");
    } else {
        let snapshot = serde_json::to_string_pretty(&pipeline.metrics.snapshot())?;
        println!("{snapshot}");
    }
    if pipeline.backfill_failures() > 0 {
        println!(
            "{} back-fill failures: {}",
            "!".yellow(),
            pipeline.backfill_failures()
        );
    }
    Ok(())
}

/// One operation from the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Op {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

impl FromStr for Op {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        let Some((verb, rest)) = raw.split_once(':') else {
            bail!("malformed operation {raw:?}: expected set:KEY=VALUE, get:KEY or del:KEY");
        };
        match verb {
            "set" => match rest.split_once('=') {
                Some((key, value)) => Ok(Op::Set {
                    key: key.to_owned(),
                    value: value.to_owned(),
                }),
                None => bail!("malformed set {raw:?}: expected set:KEY=VALUE"),
            },
            "get" => Ok(Op::Get {
                key: rest.to_owned(),
            }),
            "del" | "delete" => Ok(Op::Delete {
                key: rest.to_owned(),
            }),
            other => bail!("unknown operation {other:?}"),
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Set { key, value } => write!(f, "set {key} = {value}"),
            Op::Get { key } => write!(f, "get {key}"),
            Op::Delete { key } => write!(f, "del {key}"),
        }
    }
}

impl Op {
    fn apply(&self, store: &dyn Store) -> strata_store::StoreResult<String> {
        match self {
            Op::Set { key, value } => {
                store.set(key, value.as_bytes())?;
                Ok(self.to_string())
            }
            Op::Get { key } => Ok(match store.get(key)? {
                Some(value) => format!("get {key} = {}", String::from_utf8_lossy(&value)),
                None => format!("get {key}: not found"),
            }),
            Op::Delete { key } => {
                store.delete(key)?;
                Ok(self.to_string())
            }
        }
    }
}
