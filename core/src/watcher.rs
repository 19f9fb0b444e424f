//! Filesystem source for `config-changed` notifications.
//!
//! Debouncing is not done here. Every relevant raw event becomes one
//! [`PendingChange`] and the ingestion session collapses them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::MarkerConfig;
use crate::error::CoreError;
use crate::ingest::{ChangeType, PendingChange};
use crate::source::SourceClassifier;

/// One path handed to the OS watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub recursive: bool,
}

impl WatchTarget {
    fn mode(&self) -> RecursiveMode {
        if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        }
    }
}

/// The user and project config locations that currently exist.
///
/// Registry files and `settings.json` are watched on their own, agent
/// directories recursively. The home directory itself is never watched.
pub fn watch_targets(
    markers: &MarkerConfig,
    home: Option<&Path>,
    project_root: &Path,
) -> Vec<WatchTarget> {
    let mut candidates = Vec::new();
    if let Some(home) = home {
        candidates.push((home.join(&markers.user_mcp), false));
        candidates.push((home.join(".claude").join("settings.json"), false));
        candidates.push((home.join(&markers.agents), true));
    }
    candidates.push((project_root.join(&markers.project_mcp), false));
    candidates.push((project_root.join(&markers.agents), true));

    candidates
        .into_iter()
        .filter(|(path, _)| path.exists())
        .map(|(path, recursive)| WatchTarget { path, recursive })
        .collect()
}

/// Change type for a raw event on `path`, or `None` for events that do not
/// alter content.
///
/// Modify events also cover renames, so a modified path that is gone is
/// reported as a delete.
pub fn change_type_for(kind: &EventKind, path: &Path) -> Option<ChangeType> {
    match kind {
        EventKind::Create(_) => Some(ChangeType::Create),
        EventKind::Modify(_) if path.exists() => Some(ChangeType::Modify),
        EventKind::Modify(_) | EventKind::Remove(_) => Some(ChangeType::Delete),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Notifications for the tracked config files an event touched.
pub fn pending_changes(event: &Event, classifier: &SourceClassifier) -> Vec<PendingChange> {
    event
        .paths
        .iter()
        .filter(|path| classifier.is_config_file(path))
        .filter_map(|path| {
            change_type_for(&event.kind, path)
                .map(|change_type| PendingChange::new(path.display().to_string(), change_type))
        })
        .collect()
}

/// Keeps an OS watcher alive and forwards tracked changes to `sink`.
pub struct ConfigFileWatcher {
    _watcher: RecommendedWatcher,
    targets: Vec<WatchTarget>,
}

impl ConfigFileWatcher {
    pub fn new<F>(targets: Vec<WatchTarget>, classifier: SourceClassifier, sink: F) -> Result<Self>
    where
        F: Fn(PendingChange) + Send + 'static,
    {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in pending_changes(&event, &classifier) {
                        tracing::trace!(
                            path = %change.path,
                            change_type = %change.change_type,
                            "config file event"
                        );
                        sink(change);
                    }
                }
                Err(err) => tracing::warn!("config watcher error: {err}"),
            },
            notify::Config::default(),
        )
        .map_err(CoreError::from)
        .context("Failed to create file watcher")?;

        for target in &targets {
            watcher
                .watch(&target.path, target.mode())
                .map_err(CoreError::from)
                .with_context(|| format!("Failed to watch path: {}", target.path.display()))?;
            tracing::info!(path = %target.path.display(), recursive = target.recursive, "watching");
        }

        Ok(Self {
            _watcher: watcher,
            targets,
        })
    }

    pub fn targets(&self) -> &[WatchTarget] {
        &self.targets
    }
}
