//! Categorization and highlight statistics for two-project comparison.
//!
//! The structural diff itself is computed by an external [`DiffProvider`];
//! this module only counts, filters and keeps the last good result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffStatus {
    Match,
    Different,
    OnlyLeft,
    OnlyRight,
}

impl DiffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffStatus::Match => "match",
            DiffStatus::Different => "different",
            DiffStatus::OnlyLeft => "only-left",
            DiffStatus::OnlyRight => "only-right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// One externally computed comparison result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    pub capability_id: String,
    pub status: DiffStatus,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_value: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSummary {
    pub total_differences: usize,
    pub only_in_a: usize,
    pub only_in_b: usize,
    pub different_values: usize,
}

impl HighlightSummary {
    pub fn from_records(records: &[DiffRecord]) -> Self {
        records
            .iter()
            .fold(Self::default(), |mut summary, record| {
                match record.status {
                    DiffStatus::Match => return summary,
                    DiffStatus::Different => summary.different_values += 1,
                    DiffStatus::OnlyLeft => summary.only_in_a += 1,
                    DiffStatus::OnlyRight => summary.only_in_b += 1,
                }
                summary.total_differences += 1;
                summary
            })
    }
}

/// Which diff categories are shown.
///
/// `only_a`, `only_b` and `different` are the blue, green and yellow
/// highlight categories. Matching records only show while
/// `show_only_differences` is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffFilter {
    pub show_only_differences: bool,
    pub show_only_a: bool,
    pub show_only_b: bool,
    pub show_different: bool,
}

impl Default for DiffFilter {
    fn default() -> Self {
        Self {
            show_only_differences: false,
            show_only_a: true,
            show_only_b: true,
            show_different: true,
        }
    }
}

impl DiffFilter {
    pub fn is_visible(&self, record: &DiffRecord) -> bool {
        match record.status {
            DiffStatus::Match => !self.show_only_differences,
            DiffStatus::OnlyLeft => self.show_only_a,
            DiffStatus::OnlyRight => self.show_only_b,
            DiffStatus::Different => self.show_different,
        }
    }

    pub fn apply<'a>(&self, records: &'a [DiffRecord]) -> Vec<&'a DiffRecord> {
        records.iter().filter(|r| self.is_visible(r)).collect()
    }

    pub fn toggle_only_differences(&mut self) {
        self.show_only_differences = !self.show_only_differences;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// External structural comparison between two project roots.
#[async_trait]
pub trait DiffProvider: Send + Sync {
    async fn compare_projects(&self, left: &str, right: &str) -> Result<Vec<DiffRecord>>;
}

/// A completed comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSnapshot {
    pub left: String,
    pub right: String,
    pub records: Vec<DiffRecord>,
    pub summary: HighlightSummary,
    /// Request number that produced this snapshot.
    pub generation: u64,
}

/// Holds the last successful comparison and publishes replacements.
pub struct ComparisonState {
    current: watch::Sender<Option<Arc<ComparisonSnapshot>>>,
    generation: AtomicU64,
}

impl Default for ComparisonState {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonState {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ComparisonSnapshot>>> {
        self.current.subscribe()
    }

    pub fn snapshot(&self) -> Option<Arc<ComparisonSnapshot>> {
        self.current.borrow().clone()
    }

    /// Number of comparisons requested so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Ask `provider` for a fresh comparison.
    ///
    /// On failure the error is returned and the published snapshot is left
    /// alone. A result that arrives after a newer request has already
    /// published is returned to the caller but not published.
    pub async fn compare<P>(
        &self,
        provider: &P,
        left: &str,
        right: &str,
    ) -> Result<Arc<ComparisonSnapshot>>
    where
        P: DiffProvider + ?Sized,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let records = match provider.compare_projects(left, right).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(
                    category = err.category().as_str(),
                    generation,
                    "comparison failed, keeping last result: {err}"
                );
                return Err(err);
            }
        };

        let snapshot = Arc::new(ComparisonSnapshot {
            left: left.to_string(),
            right: right.to_string(),
            summary: HighlightSummary::from_records(&records),
            records,
            generation,
        });

        let published = self.current.send_if_modified(|current| {
            let newer_published = current
                .as_ref()
                .is_some_and(|existing| existing.generation > generation);
            if !newer_published {
                *current = Some(Arc::clone(&snapshot));
            }
            !newer_published
        });
        tracing::debug!(
            generation,
            published,
            differences = snapshot.summary.total_differences,
            "comparison finished"
        );

        Ok(snapshot)
    }
}
