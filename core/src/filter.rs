//! Predicates and comparators over unified capabilities.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::capability::{
    CapabilityKind, CapabilityPayload, CapabilityStatus, UnifiedCapability, locale_cmp,
};
use crate::source::ConfigScope;

/// Conjunction of optional criteria; an unset field places no restriction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub kind: Option<CapabilityKind>,
    pub source: Option<ConfigScope>,
    pub status: Option<CapabilityStatus>,
    pub search_query: Option<String>,
}

impl FilterCriteria {
    pub fn matches(&self, capability: &UnifiedCapability) -> bool {
        if self.kind.is_some_and(|kind| kind != capability.kind) {
            return false;
        }
        if self.source.is_some_and(|source| source != capability.source) {
            return false;
        }
        if self.status.is_some_and(|status| status != capability.status) {
            return false;
        }
        // a blank query is no query; anything else is matched as typed
        match self.search_query.as_deref() {
            Some(query) if !query.trim().is_empty() => {
                matches_query(capability, &query.to_lowercase())
            }
            _ => true,
        }
    }
}

/// Case-insensitive substring search over the name, the description and the
/// payload fields a user would recognise.
fn matches_query(capability: &UnifiedCapability, query: &str) -> bool {
    let contains = |text: &str| text.to_lowercase().contains(query);

    if contains(&capability.name) {
        return true;
    }
    if capability.description.as_deref().is_some_and(contains) {
        return true;
    }

    match &capability.payload {
        CapabilityPayload::Mcp(server) => {
            contains(server.connection_type.as_str()) || contains(&server.config.to_string())
        }
        CapabilityPayload::Agent(agent) => {
            contains(&agent.model)
                || contains(agent.permissions.permission_type.as_str())
                || agent.permissions.scopes.iter().any(|scope| contains(scope))
        }
    }
}

/// Keep the capabilities matching every provided criterion, in input order.
pub fn filter(
    capabilities: &[UnifiedCapability],
    criteria: &FilterCriteria,
) -> Vec<UnifiedCapability> {
    capabilities
        .iter()
        .filter(|capability| criteria.matches(capability))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Kind,
    Status,
    Source,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn compare(&self, a: &UnifiedCapability, b: &UnifiedCapability) -> Ordering {
        let ordering = match self.field {
            SortField::Name => locale_cmp(&a.name, &b.name),
            SortField::Kind => locale_cmp(a.kind.as_str(), b.kind.as_str()),
            SortField::Status => locale_cmp(a.status.as_str(), b.status.as_str()),
            SortField::Source => locale_cmp(a.source.as_str(), b.source.as_str()),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Sorted copy of `capabilities`; equal keys keep their input order in both
/// directions.
pub fn sort(capabilities: &[UnifiedCapability], spec: SortSpec) -> Vec<UnifiedCapability> {
    let mut sorted = capabilities.to_vec();
    sorted.sort_by(|a, b| spec.compare(a, b));
    sorted
}
