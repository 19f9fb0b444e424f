//! Capability records and their unified projection.
//!
//! Two upstream parsers hand us differently shaped records: MCP server
//! registrations and agent definitions. Everything downstream (filtering,
//! sorting, comparison) works on [`UnifiedCapability`], which keeps the
//! common fields flat and carries the kind-specific part as a payload.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::{ConfigScope, SourceClassifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Mcp,
    Agent,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Mcp => "mcp",
            CapabilityKind::Agent => "agent",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityStatus {
    Active,
    Inactive,
    Error,
}

impl CapabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityStatus::Active => "active",
            CapabilityStatus::Inactive => "inactive",
            CapabilityStatus::Error => "error",
        }
    }
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport an MCP server is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Stdio,
    Http,
    Sse,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Stdio => "stdio",
            ConnectionType::Http => "http",
            ConnectionType::Sse => "sse",
        }
    }
}

/// How to reach an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Server block exactly as declared in the registry file.
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    Read,
    Write,
    Admin,
    Custom,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Read => "read",
            PermissionType::Write => "write",
            PermissionType::Admin => "admin",
            PermissionType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPermissions {
    #[serde(rename = "type")]
    pub permission_type: PermissionType,

    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Model and permission settings of an agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub model: String,
    pub permissions: AgentPermissions,
}

/// MCP server registration as produced by the registry parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpCapability {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: CapabilityStatus,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    pub server: ServerDescriptor,
}

/// Agent definition as produced by the agent markdown parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapability {
    /// Stable identity when the definition declares one; falls back to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: CapabilityStatus,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    pub agent: AgentDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CapabilityRecord {
    Mcp(McpCapability),
    Agent(AgentCapability),
}

impl From<McpCapability> for CapabilityRecord {
    fn from(record: McpCapability) -> Self {
        CapabilityRecord::Mcp(record)
    }
}

impl From<AgentCapability> for CapabilityRecord {
    fn from(record: AgentCapability) -> Self {
        CapabilityRecord::Agent(record)
    }
}

/// Kind-specific part of a unified capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityPayload {
    Mcp(ServerDescriptor),
    Agent(AgentDescriptor),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedCapability {
    pub id: String,
    pub kind: CapabilityKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: CapabilityStatus,
    pub source: ConfigScope,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    pub payload: CapabilityPayload,
}

/// Output of [`CapabilityUnifier::unify`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedCapabilities {
    pub capabilities: Vec<UnifiedCapability>,
    pub total_count: usize,
    pub mcp_count: usize,
    pub agent_count: usize,
}

/// Deterministic id for a capability: same inputs, same id, every run.
pub fn capability_id(kind: CapabilityKind, identity: &str, source_path: &str) -> String {
    format!("{kind}:{identity}@{source_path}")
}

/// Locale-style string ordering: case-insensitive first, lowercase before
/// uppercase when the letters agree.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| b.cmp(a))
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityUnifier {
    classifier: SourceClassifier,
}

impl CapabilityUnifier {
    pub fn new(classifier: SourceClassifier) -> Self {
        Self { classifier }
    }

    pub fn to_unified(&self, record: CapabilityRecord) -> UnifiedCapability {
        match record {
            CapabilityRecord::Mcp(mcp) => {
                let kind = CapabilityKind::Mcp;
                UnifiedCapability {
                    id: capability_id(kind, &mcp.name, &mcp.source_path),
                    kind,
                    source: self.classifier.classify(&mcp.source_path, kind),
                    name: mcp.name,
                    description: mcp.description,
                    status: mcp.status,
                    source_path: mcp.source_path,
                    last_modified: mcp.last_modified,
                    payload: CapabilityPayload::Mcp(mcp.server),
                }
            }
            CapabilityRecord::Agent(agent) => {
                let kind = CapabilityKind::Agent;
                let identity = agent.id.as_deref().unwrap_or(&agent.name);
                UnifiedCapability {
                    id: capability_id(kind, identity, &agent.source_path),
                    kind,
                    source: self.classifier.classify(&agent.source_path, kind),
                    name: agent.name,
                    description: agent.description,
                    status: agent.status,
                    source_path: agent.source_path,
                    last_modified: agent.last_modified,
                    payload: CapabilityPayload::Agent(agent.agent),
                }
            }
        }
    }

    /// Project both record sets and order them by name.
    ///
    /// The sort is stable, so records with equal names keep the order they
    /// arrived in (all MCP records before all agents).
    pub fn unify(
        &self,
        mcp_records: Vec<McpCapability>,
        agent_records: Vec<AgentCapability>,
    ) -> UnifiedCapabilities {
        let mcp_count = mcp_records.len();
        let agent_count = agent_records.len();

        let mut capabilities: Vec<UnifiedCapability> = mcp_records
            .into_iter()
            .map(CapabilityRecord::from)
            .chain(agent_records.into_iter().map(CapabilityRecord::from))
            .map(|record| self.to_unified(record))
            .collect();
        capabilities.sort_by(|a, b| locale_cmp(&a.name, &b.name));

        tracing::debug!(mcp_count, agent_count, "unified capabilities");

        UnifiedCapabilities {
            total_count: capabilities.len(),
            capabilities,
            mcp_count,
            agent_count,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde_json::json;

    pub fn mcp(name: &str, source_path: &str, status: CapabilityStatus) -> McpCapability {
        McpCapability {
            name: name.to_string(),
            description: Some(format!("{name} server")),
            status,
            source_path: source_path.to_string(),
            last_modified: None,
            server: ServerDescriptor {
                connection_type: ConnectionType::Stdio,
                command: Some("npx".to_string()),
                args: vec![format!("@mcp/{name}")],
                url: None,
                env: BTreeMap::new(),
                config: json!({ "command": "npx", "args": [format!("@mcp/{name}")] }),
            },
        }
    }

    pub fn agent(name: &str, source_path: &str, status: CapabilityStatus) -> AgentCapability {
        AgentCapability {
            id: None,
            name: name.to_string(),
            description: None,
            status,
            source_path: source_path.to_string(),
            last_modified: None,
            agent: AgentDescriptor {
                model: "sonnet".to_string(),
                permissions: AgentPermissions {
                    permission_type: PermissionType::Read,
                    scopes: vec!["repo".to_string()],
                },
            },
        }
    }
}
