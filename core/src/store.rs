//! In-memory state for the active scope.
//!
//! [`ScopeStore`] owns the live config entries and unified capabilities,
//! keeps one resolver cache per domain, and publishes every change on a
//! `watch` channel. It is the host the ingestion pipeline flushes into.
//!
//! Removals for deleted files are staged and published together with the
//! next successful reload, so subscribers never see a view that only has
//! the deletions applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::capability::{AgentCapability, CapabilityUnifier, McpCapability, UnifiedCapabilities};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ingest::ChangeHost;
use crate::inheritance::{ConfigEntry, InheritanceResolver, ResolvedChain};
use crate::source::{CacheDomains, ConfigScope, SourceClassifier};

/// Raw contents of one scope as returned by the loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeContents {
    #[serde(default)]
    pub entries: Vec<ConfigEntry>,
    #[serde(default)]
    pub mcp: Vec<McpCapability>,
    #[serde(default)]
    pub agents: Vec<AgentCapability>,
}

/// Reads a scope's entries and capability records from disk or a host.
#[async_trait]
pub trait ScopeLoader: Send + Sync {
    async fn load_scope(&self, scope: ConfigScope) -> Result<ScopeContents>;
}

/// What subscribers see.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreView {
    pub active_scope: ConfigScope,
    pub entries: Vec<ConfigEntry>,
    pub capabilities: UnifiedCapabilities,
    /// Bumped on every published change.
    pub revision: u64,
}

pub struct ScopeStore<L: ?Sized> {
    loader: Arc<L>,
    classifier: SourceClassifier,
    unifier: CapabilityUnifier,
    user_cache: InheritanceResolver,
    project_cache: InheritanceResolver,
    staged_deletes: Mutex<Vec<String>>,
    view: watch::Sender<Arc<StoreView>>,
}

impl<L: ScopeLoader + ?Sized> ScopeStore<L> {
    pub fn new(loader: Arc<L>, config: &EngineConfig, scope: ConfigScope) -> Self {
        let classifier = SourceClassifier::new(config.markers.clone());
        let (view, _) = watch::channel(Arc::new(StoreView {
            active_scope: scope,
            entries: Vec::new(),
            capabilities: UnifiedCapabilities::default(),
            revision: 0,
        }));

        Self {
            loader,
            unifier: CapabilityUnifier::new(classifier.clone()),
            classifier,
            user_cache: InheritanceResolver::from_config(&config.cache),
            project_cache: InheritanceResolver::from_config(&config.cache),
            staged_deletes: Mutex::new(Vec::new()),
            view,
        }
    }

    pub fn classifier(&self) -> &SourceClassifier {
        &self.classifier
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<StoreView>> {
        self.view.subscribe()
    }

    pub fn view(&self) -> Arc<StoreView> {
        Arc::clone(&self.view.borrow())
    }

    pub fn active_scope(&self) -> ConfigScope {
        self.view.borrow().active_scope
    }

    /// Resolver cache backing `scope`.
    pub fn cache_for(&self, scope: ConfigScope) -> &InheritanceResolver {
        match scope {
            ConfigScope::User => &self.user_cache,
            ConfigScope::Project | ConfigScope::Local => &self.project_cache,
        }
    }

    /// Inheritance chain over the live entries, served from the active
    /// scope's cache when possible.
    pub fn chain(&self) -> Arc<ResolvedChain> {
        let view = self.view();
        self.cache_for(view.active_scope).resolve(&view.entries)
    }

    /// Reload the active scope. A failed load leaves the current view as it
    /// was and discards any staged removals.
    pub async fn reload(&self) -> Result<()> {
        let scope = self.active_scope();
        self.load_into(scope).await
    }

    /// Switch to `scope` and load it. The switch only happens if the load
    /// succeeds.
    pub async fn activate(&self, scope: ConfigScope) -> Result<()> {
        self.load_into(scope).await
    }

    /// Source paths waiting to be dropped by the next reload.
    pub fn staged_deletes(&self) -> Vec<String> {
        self.staged().clone()
    }

    fn staged(&self) -> MutexGuard<'_, Vec<String>> {
        self.staged_deletes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn load_into(&self, scope: ConfigScope) -> Result<()> {
        let loaded = self.loader.load_scope(scope).await;
        let deleted = std::mem::take(&mut *self.staged());
        let mut contents = match loaded {
            Ok(contents) => contents,
            Err(err) => {
                if !deleted.is_empty() {
                    tracing::debug!(
                        discarded = deleted.len(),
                        "reload failed, dropping staged removals"
                    );
                }
                return Err(err);
            }
        };

        let is_deleted = |path: &str| deleted.iter().any(|p| p == path);
        let count = |c: &ScopeContents| c.entries.len() + c.mcp.len() + c.agents.len();
        let before = count(&contents);
        contents.entries.retain(|entry| !is_deleted(&entry.source.path));
        contents.mcp.retain(|mcp| !is_deleted(&mcp.source_path));
        contents.agents.retain(|agent| !is_deleted(&agent.source_path));
        let removed = before - count(&contents);
        let capabilities = self.unifier.unify(contents.mcp, contents.agents);

        self.view.send_modify(|view| {
            *view = Arc::new(StoreView {
                active_scope: scope,
                entries: contents.entries,
                capabilities,
                revision: view.revision + 1,
            });
        });
        tracing::debug!(%scope, removed, "scope loaded");
        Ok(())
    }
}

#[async_trait]
impl<L: ScopeLoader + ?Sized> ChangeHost for ScopeStore<L> {
    fn remove_deleted(&self, paths: &[String]) {
        let mut staged = self.staged();
        for path in paths {
            if !staged.contains(path) {
                staged.push(path.clone());
            }
        }
        tracing::debug!(staged = staged.len(), "removals staged for next reload");
    }

    fn invalidate(&self, domains: CacheDomains) {
        if domains.user {
            self.user_cache.invalidate();
        }
        if domains.project {
            self.project_cache.invalidate();
        }
    }

    async fn reload_active_scope(&self) -> Result<()> {
        self.reload().await
    }
}
