//! Command-line front end: a memory tier combined with a disk folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use shoal_core::{CombinationConfig, MemoryStorage, PullStrategy, ReadWrite, SetStrategy, Storage};
use tracing::info;

use crate::codec::ValueCodecs;
use crate::disk::{DiskFolderStorage, StringKeys};
use crate::filename::Filename;

#[derive(Debug, Parser)]
#[command(name = "shoal")]
#[command(about = "Read and write a tiered key-value store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Folder holding the disk tier
    #[arg(short, long, env = "SHOAL_DIR", default_value = ".shoal")]
    pub dir: PathBuf,

    /// When a disk hit is copied into memory
    #[arg(long, default_value = "pull_then_complete", value_parser = parse_strategy::<PullStrategy>)]
    pub pull: PullStrategy,

    /// Which tiers a write reaches
    #[arg(long, default_value = "front_first", value_parser = parse_strategy::<SetStrategy>)]
    pub set_strategy: SetStrategy,

    /// Trace every combinator decision
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the value stored for a key
    Get { key: String },
    /// Store a value for a key
    Set { key: String, value: String },
}

/// Strategy names are the `snake_case` forms used in configuration files.
fn parse_strategy<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_owned())).map_err(|e| e.to_string())
}

impl Cli {
    #[must_use]
    pub fn combination_config(&self) -> CombinationConfig {
        CombinationConfig {
            pull_strategy: self.pull,
            set_strategy: self.set_strategy,
            verbose: self.verbose,
            ..CombinationConfig::default()
        }
    }
}

/// Builds the tiered storage described by `cli`.
#[must_use]
pub fn open_storage(cli: &Cli) -> Storage<String, String> {
    let config = cli.combination_config();
    config.install_verbose();
    let disk = DiskFolderStorage::new(&cli.dir).into_storage();
    MemoryStorage::<Filename, Bytes>::new()
        .named("memory")
        .into_storage()
        .combined_with(disk, &config)
        .using_string_keys()
        .string_values()
}

/// Runs one command. Returns the text to print, if any.
///
/// # Errors
///
/// Fails when the key is missing or the disk tier cannot be read or written.
pub async fn run(cli: &Cli) -> Result<Option<String>> {
    let storage = open_storage(cli);
    info!(storage = storage.name(), "opened");
    match &cli.command {
        Command::Get { key } => {
            let value = storage
                .retrieve(key.clone())
                .await
                .with_context(|| format!("no value for key {key:?}"))?;
            Ok(Some(value))
        }
        Command::Set { key, value } => {
            storage
                .set(value.clone(), key.clone())
                .await
                .with_context(|| format!("cannot store key {key:?}"))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("shoal").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&["--dir", "/tmp/x", "get", "k"]);
        assert_eq!(cli.pull, PullStrategy::PullThenComplete);
        assert_eq!(cli.set_strategy, SetStrategy::FrontFirst);
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Command::Get { ref key } if key == "k"));
    }

    #[test]
    fn strategies_parse_from_snake_case() {
        let cli = parse(&["--pull", "never_pull", "--set-strategy", "back_only", "set", "k", "v"]);
        assert_eq!(cli.pull, PullStrategy::NeverPull);
        assert_eq!(cli.set_strategy, SetStrategy::BackOnly);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let parsed = Cli::try_parse_from(["shoal", "--pull", "sometimes", "get", "k"]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn set_then_get_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_str().unwrap();

        let set = parse(&["--dir", dir_arg, "set", "greeting", "hello"]);
        assert_eq!(run(&set).await.unwrap(), None);

        // A fresh invocation starts with an empty memory tier.
        let get = parse(&["--dir", dir_arg, "get", "greeting"]);
        assert_eq!(run(&get).await.unwrap().as_deref(), Some("hello"));

        let missing = parse(&["--dir", dir_arg, "get", "absent"]);
        assert!(run(&missing).await.is_err());
    }
}
