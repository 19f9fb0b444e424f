//! Root of the `ccview-core` library.
//!
//! Resolution and comparison engine for capability configuration (MCP
//! servers and agents) declared at user and project level.

// Library code reports through `tracing`; only the CLI writes to the terminal.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod capability;
pub mod config;
pub mod diff;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod inheritance;
pub mod source;
pub mod store;
pub mod watcher;

pub use capability::{
    AgentCapability, CapabilityKind, CapabilityRecord, CapabilityStatus, CapabilityUnifier,
    McpCapability, UnifiedCapabilities, UnifiedCapability,
};
pub use config::{ConfigLoader, EngineConfig};
pub use diff::{ComparisonState, DiffFilter, DiffProvider, DiffRecord, HighlightSummary};
pub use error::{CoreError, ErrorCategory, Result};
pub use export::{ComparisonExport, ExportFormat, ExportResult};
pub use filter::{FilterCriteria, SortDirection, SortField, SortSpec};
pub use ingest::{
    CONFIG_CHANGED_EVENT, ChangeHost, ChangeType, IngestEvent, PendingChange, WatchSession,
};
pub use inheritance::{ConfigEntry, ConfigSource, InheritanceChain, InheritanceResolver};
pub use source::{CacheDomains, ConfigScope, SourceClassifier};
pub use store::{ScopeContents, ScopeLoader, ScopeStore};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
