use crate::config::error::{ConfigError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet period after the last change notification before a flush
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Inheritance resolver cache limits
    #[serde(default)]
    pub cache: CacheConfig,

    /// Filename markers used to classify config paths
    #[serde(default)]
    pub markers: MarkerConfig,
}

/// Inheritance resolver cache limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of memoized chains
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Age after which a memoized chain is purged on the next write
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// Filename markers for the two capability registries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// User-level MCP server registry (e.g. `~/.claude.json`)
    #[serde(default = "default_user_mcp_marker")]
    pub user_mcp: String,

    /// Project-level MCP server registry (e.g. `./.mcp.json`)
    #[serde(default = "default_project_mcp_marker")]
    pub project_mcp: String,

    /// Agent definition directory (e.g. `~/.claude/agents`)
    #[serde(default = "default_agents_marker")]
    pub agents: String,
}

fn default_debounce_ms() -> u64 {
    300
}
fn default_cache_capacity() -> usize {
    10
}
fn default_cache_ttl_secs() -> u64 {
    60
}
fn default_user_mcp_marker() -> String {
    ".claude.json".to_string()
}
fn default_project_mcp_marker() -> String {
    ".mcp.json".to_string()
}
fn default_agents_marker() -> String {
    ".claude/agents".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            user_mcp: default_user_mcp_marker(),
            project_mcp: default_project_mcp_marker(),
            agents: default_agents_marker(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cache: CacheConfig::default(),
            markers: MarkerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.debounce_ms == 0 {
            errors.push("debounce_ms must be at least 1".to_string());
        }
        if self.cache.capacity == 0 {
            errors.push("cache.capacity must be at least 1".to_string());
        }
        for (field, marker) in [
            ("markers.user_mcp", &self.markers.user_mcp),
            ("markers.project_mcp", &self.markers.project_mcp),
            ("markers.agents", &self.markers.agents),
        ] {
            if marker.trim().is_empty() {
                errors.push(format!("{field} must not be empty"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Configuration loader with layered merging support
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Start with defaults (from Default implementations)
    /// 2. Merge config file if provided
    /// 3. Override with environment variables (CCVIEW_ prefix)
    pub fn load(&self) -> Result<EngineConfig> {
        let mut builder = Config::builder();

        let defaults_json = serde_json::to_string(&EngineConfig::default())?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(ref path) = self.config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_ref()));
            } else {
                return Err(ConfigError::NotFound(path.clone()));
            }
        }

        // Example: CCVIEW_CACHE__CAPACITY=20
        builder = builder.add_source(
            Environment::with_prefix("CCVIEW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let engine_config: EngineConfig = builder.build()?.try_deserialize()?;
        engine_config.validate()?;

        tracing::debug!(
            debounce_ms = engine_config.debounce_ms,
            cache_capacity = engine_config.cache.capacity,
            cache_ttl_secs = engine_config.cache.ttl_secs,
            "engine config loaded"
        );

        Ok(engine_config)
    }

    /// Locate the default config file in standard locations:
    /// 1. Current directory: ./ccview.toml
    /// 2. XDG config: ~/.config/ccview/config.toml
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from("./ccview.toml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("ccview").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        None
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<EngineConfig> {
        let loader = match Self::find_config_file() {
            Some(config_path) => ConfigLoader::new().with_file(config_path),
            None => ConfigLoader::new(),
        };

        loader.load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
