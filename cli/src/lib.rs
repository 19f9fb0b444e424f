//! Command line front end for the capability engine.
//!
//! Every subcommand reads JSON produced by the config parsers (or a host
//! application) and prints either a human-readable listing or JSON.

pub mod classify_cmd;
mod output;
pub mod resolve_cmd;
pub mod summarize_cmd;
pub mod unify_cmd;
pub mod watch_cmd;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ccview_core::EngineConfig;
use ccview_core::config::ConfigLoader;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

#[derive(Debug, Parser)]
#[command(name = "ccview", version, about = "Inspect MCP server and agent configuration")]
pub struct Cli {
    /// Engine settings file (TOML). Defaults to ./ccview.toml, then
    /// ~/.config/ccview/config.toml.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge MCP and agent records into one sorted, filterable list.
    Unify(unify_cmd::UnifyArgs),
    /// Resolve config entries by priority and show what overrides what.
    Resolve(resolve_cmd::ResolveArgs),
    /// Count and list diff records from a project comparison.
    Summarize(summarize_cmd::SummarizeArgs),
    /// Show the precedence level and cache domains for paths.
    Classify(classify_cmd::ClassifyArgs),
    /// Watch config files and log each debounced flush until Ctrl-C.
    Watch(watch_cmd::WatchArgs),
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Unify(args) => unify_cmd::run(&args, &config),
        Command::Resolve(args) => resolve_cmd::run(&args, &config),
        Command::Summarize(args) => summarize_cmd::run(&args).await,
        Command::Classify(args) => classify_cmd::run(&args, &config),
        Command::Watch(args) => watch_cmd::run(&args, &config).await,
    }
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => ConfigLoader::new().with_file(path).load(),
        None => ConfigLoader::load_default(),
    };
    config.context("Failed to load engine configuration")
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Parse a lowercase enum value the same way it appears in JSON input.
pub(crate) fn parse_enum<T: DeserializeOwned>(raw: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("unrecognised value `{raw}`"))
}
