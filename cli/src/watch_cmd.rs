//! `ccview watch`
//!
//! Wires the filesystem watcher into an ingestion session backed by a
//! [`ScopeStore`], then reports every flush until interrupted.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ccview_core::store::ScopeContents;
use ccview_core::watcher::{ConfigFileWatcher, watch_targets};
use ccview_core::{
    ConfigScope, CoreError, EngineConfig, IngestEvent, ScopeLoader, ScopeStore, WatchSession,
};
use clap::Parser;

use crate::output::{Printer, Tone, print_json};
use crate::parse_enum;

#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Project root to watch (defaults to the current directory).
    #[arg(long = "project", short = 'C')]
    pub project: Option<PathBuf>,

    /// Directory holding `<scope>.json` snapshots to reload after each flush.
    #[arg(long = "snapshots")]
    pub snapshots: Option<PathBuf>,

    /// Scope to keep loaded: user, project or local.
    #[arg(long = "scope", default_value = "project", value_parser = parse_enum::<ConfigScope>)]
    pub scope: ConfigScope,

    /// Print each flush as a JSON object.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

/// Reads pre-parsed scope contents written by the config parsers.
struct SnapshotLoader {
    dir: Option<PathBuf>,
}

#[async_trait]
impl ScopeLoader for SnapshotLoader {
    async fn load_scope(&self, scope: ConfigScope) -> ccview_core::Result<ScopeContents> {
        let Some(dir) = &self.dir else {
            return Ok(ScopeContents::default());
        };
        let path = dir.join(format!("{scope}.json"));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(ScopeContents::default());
            }
            Err(err) => return Err(CoreError::reload(scope, err.to_string())),
        };
        serde_json::from_str(&raw)
            .map_err(|err| CoreError::reload(scope, format!("{}: {err}", path.display())))
    }
}

pub async fn run(args: &WatchArgs, config: &EngineConfig) -> Result<()> {
    let project_root = match &args.project {
        Some(project) => project.clone(),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let home = dirs::home_dir();
    let targets = watch_targets(&config.markers, home.as_deref(), &project_root);
    if targets.is_empty() {
        tracing::warn!(project = %project_root.display(), "no config files found to watch");
    }

    let loader = Arc::new(SnapshotLoader {
        dir: args.snapshots.clone(),
    });
    let store = Arc::new(ScopeStore::new(loader, config, args.scope));
    store
        .reload()
        .await
        .context("Failed to load initial scope")?;

    let session = WatchSession::spawn(
        Arc::clone(&store),
        store.classifier().clone(),
        config.debounce(),
    );
    let sender = session.sender();
    let _watcher = ConfigFileWatcher::new(targets, store.classifier().clone(), move |change| {
        if let Err(err) = sender.send(change) {
            tracing::debug!("dropping config change: {err}");
        }
    })?;

    let printer = Printer::stdout();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = session.recv_event() => match event {
                Some(IngestEvent::Flushed(plan)) if args.json => print_json(&plan)?,
                Some(IngestEvent::Flushed(plan)) => {
                    let view = store.view();
                    printer.line(&format!(
                        "{} {} change(s), {} deleted, {} capabilities loaded",
                        printer.paint("flushed", Tone::Green),
                        plan.change_count,
                        plan.deleted_paths.len(),
                        view.capabilities.total_count,
                    ))?;
                }
                Some(IngestEvent::ReloadFailed { error, .. }) => {
                    let label = printer.paint("reload failed:", Tone::Yellow);
                    printer.line(&format!("{label} {error}"))?;
                }
                None => break,
            },
        }
    }

    session.stop().await;
    Ok(())
}
