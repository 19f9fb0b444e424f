//! Precedence classification for config paths.
//!
//! Every capability is traced back to the file it was declared in, and that
//! path alone decides which precedence level it belongs to. The same rule is
//! used to decide which caches a filesystem change invalidates.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityKind;
use crate::config::MarkerConfig;

/// Precedence level a capability or config entry was declared at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    User,
    Project,
    Local,
}

impl ConfigScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::User => "user",
            ConfigScope::Project => "project",
            ConfigScope::Local => "local",
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache domains touched by a change to one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheDomains {
    pub user: bool,
    pub project: bool,
}

impl CacheDomains {
    pub const USER: Self = Self {
        user: true,
        project: false,
    };
    pub const PROJECT: Self = Self {
        user: false,
        project: true,
    };
    pub const BOTH: Self = Self {
        user: true,
        project: true,
    };

    pub fn union(self, other: Self) -> Self {
        Self {
            user: self.user || other.user,
            project: self.project || other.project,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.user && !self.project
    }
}

/// Classifies paths against the registry filename markers.
#[derive(Debug, Clone, Default)]
pub struct SourceClassifier {
    markers: MarkerConfig,
}

impl SourceClassifier {
    pub fn new(markers: MarkerConfig) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &MarkerConfig {
        &self.markers
    }

    /// Registry marker for a capability kind.
    pub fn marker_for(&self, kind: CapabilityKind) -> &str {
        match kind {
            CapabilityKind::Mcp => &self.markers.user_mcp,
            CapabilityKind::Agent => &self.markers.agents,
        }
    }

    /// Map a declaring path to its precedence level.
    ///
    /// Rules, in order: a non-relative path containing the kind's registry
    /// marker is `user`; a path relative to the project root is `project`;
    /// anything else is `local`.
    pub fn classify(&self, path: &str, kind: CapabilityKind) -> ConfigScope {
        let normalized = normalize(path);
        let relative = is_project_relative(&normalized);

        if !relative && normalized.contains(self.marker_for(kind)) {
            ConfigScope::User
        } else if relative {
            ConfigScope::Project
        } else {
            ConfigScope::Local
        }
    }

    /// Which caches must be dropped when `path` changes.
    ///
    /// The user registry only feeds the user cache and the project registry
    /// only feeds the project cache; anything else (agent definitions,
    /// settings files) may feed either, so both are invalidated.
    pub fn domains_for(&self, path: &str) -> CacheDomains {
        let normalized = normalize(path);
        if normalized.contains(&self.markers.user_mcp) {
            CacheDomains::USER
        } else if normalized.contains(&self.markers.project_mcp) {
            CacheDomains::PROJECT
        } else {
            CacheDomains::BOTH
        }
    }

    /// Whether `path` is one of the config files the viewer tracks:
    /// either registry file, `.claude/settings.json`, or a markdown file
    /// directly inside the agents directory.
    pub fn is_config_file(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        for marker in [&self.markers.user_mcp, &self.markers.project_mcp] {
            if Path::new(marker.as_str()).file_name().and_then(|n| n.to_str()) == Some(file_name)
            {
                return true;
            }
        }

        let parent = path.parent();
        if file_name == "settings.json"
            && parent
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                == Some(".claude")
        {
            return true;
        }

        file_name.ends_with(".md")
            && parent.is_some_and(|p| p.ends_with(Path::new(self.markers.agents.as_str())))
    }
}

/// Classify with the default markers.
pub fn classify(path: &str, kind: CapabilityKind) -> ConfigScope {
    SourceClassifier::default().classify(path, kind)
}

/// A path written relative to the project root (`./.mcp.json`).
pub fn is_project_relative(path: &str) -> bool {
    path.starts_with("./") || path.starts_with(".\\")
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}
