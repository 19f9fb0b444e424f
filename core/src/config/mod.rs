/// Engine configuration
///
/// Layered the same way as every other settings surface in this workspace:
/// 1. Defaults (from code)
/// 2. Config file (`ccview.toml`)
/// 3. Environment variables (`CCVIEW_*` prefix, `__` for nesting)
///
/// # Example
///
/// ```no_run
/// use ccview_core::config::ConfigLoader;
///
/// let config = ConfigLoader::load_default().expect("Failed to load config");
/// println!("debounce: {:?}", config.debounce());
/// ```
pub mod error;
pub mod loader;

pub use error::{ConfigError, Result};
pub use loader::{CacheConfig, ConfigLoader, EngineConfig, MarkerConfig};
