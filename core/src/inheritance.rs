//! Priority-based inheritance resolution for flat config entries.
//!
//! Entries from every precedence level are merged into one resolved map.
//! Lower `priority` numbers are processed first and the first entry seen for
//! a key wins: it is marked `inherited`, every later entry for the same key is
//! marked `overridden` and its value is discarded.
//!
//! [`InheritanceResolver`] memoizes results by content hash. The cache only
//! keeps a [`Weak`] handle to each result, so a chain nobody holds any more is
//! reclaimed, and its slot is removed as soon as the last handle drops.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::source::ConfigScope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSource {
    pub kind: ConfigScope,
    pub path: String,
    /// Lower value = higher precedence.
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub key: String,
    pub value: Value,
    pub source: ConfigSource,
    #[serde(default)]
    pub inherited: bool,
    #[serde(default)]
    pub overridden: bool,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: Value, source: ConfigSource) -> Self {
        Self {
            key: key.into(),
            value,
            source,
            inherited: false,
            overridden: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritanceChain {
    /// Annotated entries in processing order (ascending priority).
    pub entries: Vec<ConfigEntry>,
    /// Exactly one winning value per key.
    pub resolved: BTreeMap<String, Value>,
}

impl InheritanceChain {
    /// The entry whose value won for `key`.
    pub fn winner(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries
            .iter()
            .find(|entry| entry.key == key && entry.inherited)
    }

    /// Entries that lost resolution for `key`, in processing order.
    pub fn overridden(&self, key: &str) -> impl Iterator<Item = &ConfigEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.key == key && entry.overridden)
    }
}

/// Merge `entries` by priority. First processed wins.
pub fn resolve_chain(entries: &[ConfigEntry]) -> InheritanceChain {
    let mut sorted = entries.to_vec();
    // stable: equal priorities keep input order
    sorted.sort_by_key(|entry| entry.source.priority);

    let mut resolved = BTreeMap::new();
    for entry in &mut sorted {
        if resolved.contains_key(&entry.key) {
            entry.inherited = false;
            entry.overridden = true;
        } else {
            entry.inherited = true;
            entry.overridden = false;
            resolved.insert(entry.key.clone(), entry.value.clone());
        }
    }

    InheritanceChain {
        entries: sorted,
        resolved,
    }
}

/// SHA-256 over every entry's `key:value` pair plus the scope, priority and
/// path that decide how it resolves.
///
/// Each field is length-prefixed so separators inside a key or path cannot
/// make two different inputs collide.
pub fn content_hash(entries: &[ConfigEntry]) -> String {
    fn field(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }

    let mut hasher = Sha256::new();
    hasher.update((entries.len() as u64).to_le_bytes());
    for entry in entries {
        field(&mut hasher, entry.key.as_bytes());
        field(&mut hasher, entry.value.to_string().as_bytes());
        field(&mut hasher, entry.source.kind.as_str().as_bytes());
        hasher.update(entry.source.priority.to_le_bytes());
        field(&mut hasher, entry.source.path.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Memoized chain handed out by [`InheritanceResolver::resolve`].
#[derive(Debug)]
pub struct ResolvedChain {
    chain: InheritanceChain,
    hook: ReclaimHook,
}

impl ResolvedChain {
    pub fn chain(&self) -> &InheritanceChain {
        &self.chain
    }

    pub fn content_hash(&self) -> &str {
        &self.hook.hash
    }
}

impl Deref for ResolvedChain {
    type Target = InheritanceChain;

    fn deref(&self) -> &InheritanceChain {
        &self.chain
    }
}

/// Removes the cache slot of a chain once the chain itself is dropped.
#[derive(Debug)]
struct ReclaimHook {
    hash: String,
    cache: Weak<Mutex<CacheState>>,
}

impl Drop for ReclaimHook {
    fn drop(&mut self) {
        let Some(cache) = self.cache.upgrade() else {
            return;
        };
        // Never block: if the cache is busy the next lookup drops the slot.
        let mut state = match cache.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        let before = state.slots.len();
        state
            .slots
            .retain(|slot| !(slot.hash == self.hash && slot.chain.strong_count() == 0));
        if state.slots.len() != before {
            tracing::debug!(hash = %self.hash, "reclaimed inheritance cache slot");
        }
    }
}

#[derive(Debug)]
struct CacheSlot {
    hash: String,
    inserted_at: Instant,
    chain: Weak<ResolvedChain>,
}

#[derive(Debug)]
struct CacheState {
    slots: VecDeque<CacheSlot>,
    capacity: usize,
    ttl: Duration,
}

impl CacheState {
    /// Live chain for `hash`; a reclaimed slot is dropped and reported as a miss.
    fn lookup(&mut self, hash: &str) -> Option<Arc<ResolvedChain>> {
        let index = self.slots.iter().position(|slot| slot.hash == hash)?;
        match self.slots[index].chain.upgrade() {
            Some(chain) => Some(chain),
            None => {
                self.slots.remove(index);
                None
            }
        }
    }

    fn insert(&mut self, hash: String, chain: &Arc<ResolvedChain>) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.slots.retain(|slot| {
            slot.hash != hash
                && slot.chain.strong_count() > 0
                && now.duration_since(slot.inserted_at) < ttl
        });

        while self.slots.len() >= self.capacity {
            match self.slots.pop_front() {
                Some(evicted) => {
                    tracing::debug!(hash = %evicted.hash, "evicted inheritance cache slot");
                }
                None => break,
            }
        }

        self.slots.push_back(CacheSlot {
            hash,
            inserted_at: now,
            chain: Arc::downgrade(chain),
        });
    }
}

/// Inheritance resolution with a bounded, weakly held, time-limited cache.
#[derive(Debug)]
pub struct InheritanceResolver {
    state: Arc<Mutex<CacheState>>,
}

impl InheritanceResolver {
    pub const DEFAULT_CAPACITY: usize = 10;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_CAPACITY, Self::DEFAULT_TTL)
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                slots: VecDeque::new(),
                capacity: capacity.max(1),
                ttl,
            })),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_limits(config.capacity, config.ttl())
    }

    /// Resolve `entries`, reusing a cached chain for identical input.
    pub fn resolve(&self, entries: &[ConfigEntry]) -> Arc<ResolvedChain> {
        let hash = content_hash(entries);

        if let Some(hit) = self.lock().lookup(&hash) {
            tracing::debug!(%hash, "inheritance cache hit");
            return hit;
        }

        tracing::debug!(%hash, entries = entries.len(), "inheritance cache miss");
        let resolved = Arc::new(ResolvedChain {
            chain: resolve_chain(entries),
            hook: ReclaimHook {
                hash: hash.clone(),
                cache: Arc::downgrade(&self.state),
            },
        });
        self.lock().insert(hash, &resolved);
        resolved
    }

    /// Drop every memoized chain. Handles already given out stay valid.
    pub fn invalidate(&self) {
        let dropped = {
            let mut state = self.lock();
            let dropped = state.slots.len();
            state.slots.clear();
            dropped
        };
        tracing::debug!(dropped, "inheritance cache invalidated");
    }

    /// Number of occupied slots, including ones awaiting lazy cleanup.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hashes currently cached, oldest first.
    pub fn cached_hashes(&self) -> Vec<String> {
        self.lock()
            .slots
            .iter()
            .map(|slot| slot.hash.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InheritanceResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry(key: &str, value: Value, kind: ConfigScope, priority: i32) -> ConfigEntry {
        ConfigEntry::new(
            key,
            value,
            ConfigSource {
                kind,
                path: format!("/{kind}/settings.json"),
                priority,
            },
        )
    }

    fn sample() -> Vec<ConfigEntry> {
        vec![
            entry("model", json!("opus"), ConfigScope::User, 2),
            entry("theme", json!("dark"), ConfigScope::User, 2),
            entry("model", json!("sonnet"), ConfigScope::Project, 1),
            entry("timeout", json!(30), ConfigScope::Local, 3),
        ]
    }

    #[test]
    fn first_processed_entry_wins() {
        let chain = resolve_chain(&[
            entry("k", json!(1), ConfigScope::Project, 1),
            entry("k", json!(2), ConfigScope::User, 2),
        ]);

        assert_eq!(chain.resolved.get("k"), Some(&json!(1)));
        assert!(chain.entries[0].inherited);
        assert!(!chain.entries[0].overridden);
        assert!(chain.entries[1].overridden);
        assert!(!chain.entries[1].inherited);
    }

    #[test]
    fn input_order_does_not_matter_priority_does() {
        let chain = resolve_chain(&[
            entry("k", json!(2), ConfigScope::User, 2),
            entry("k", json!(1), ConfigScope::Project, 1),
        ]);

        assert_eq!(chain.resolved.get("k"), Some(&json!(1)));
        assert_eq!(chain.winner("k").map(|e| e.source.priority), Some(1));
        assert_eq!(chain.overridden("k").count(), 1);
    }

    #[test]
    fn equal_priority_keeps_input_order() {
        let chain = resolve_chain(&[
            entry("k", json!("first"), ConfigScope::User, 1),
            entry("k", json!("second"), ConfigScope::User, 1),
        ]);
        assert_eq!(chain.resolved.get("k"), Some(&json!("first")));
    }

    #[test]
    fn every_key_is_accounted_for() {
        let input = sample();
        let chain = resolve_chain(&input);

        assert_eq!(chain.entries.len(), input.len());
        for key in ["model", "theme", "timeout"] {
            assert!(chain.resolved.contains_key(key), "{key} missing");
            let winners = chain
                .entries
                .iter()
                .filter(|e| e.key == key && e.inherited)
                .count();
            assert_eq!(winners, 1, "{key} must have exactly one winner");
        }
        for entry in &chain.entries {
            assert_ne!(entry.inherited, entry.overridden);
        }
        assert_eq!(chain.resolved.get("model"), Some(&json!("sonnet")));
        assert_eq!(
            chain
                .entries
                .iter()
                .map(|e| e.source.priority)
                .collect::<Vec<_>>(),
            vec![1, 2, 2, 3]
        );
    }

    #[test]
    fn stale_flags_on_input_are_recomputed() {
        let mut input = sample();
        input[0].overridden = true;
        input[2].overridden = true;

        let chain = resolve_chain(&input);
        assert!(chain.winner("model").is_some());
        assert_eq!(chain.resolved.get("model"), Some(&json!("sonnet")));
    }

    #[test]
    fn empty_input_resolves_to_empty_chain() {
        assert_eq!(resolve_chain(&[]), InheritanceChain::default());
    }

    #[test]
    fn cache_returns_value_equal_result_for_same_input() {
        let resolver = InheritanceResolver::new();
        let first = resolver.resolve(&sample());
        let second = resolver.resolve(&sample());

        assert_eq!(first.resolved, second.resolved);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn changed_value_changes_cache_key() {
        let resolver = InheritanceResolver::new();
        let mut input = sample();
        let first = resolver.resolve(&input);

        input[2].value = json!("haiku");
        let second = resolver.resolve(&input);

        assert_ne!(first.content_hash(), second.content_hash());
        assert_eq!(second.resolved.get("model"), Some(&json!("haiku")));
        assert_eq!(first.resolved.get("model"), Some(&json!("sonnet")));
        assert_eq!(resolver.len(), 2);
    }

    #[test]
    fn scope_kind_is_part_of_cache_key() {
        let resolver = InheritanceResolver::new();
        let source = |kind| ConfigSource {
            kind,
            path: "/x/settings.json".to_string(),
            priority: 1,
        };
        let user = resolver.resolve(&[ConfigEntry::new("k", json!(1), source(ConfigScope::User))]);
        let project = resolver.resolve(&[ConfigEntry::new(
            "k",
            json!(1),
            source(ConfigScope::Project),
        )]);

        assert!(!Arc::ptr_eq(&user, &project));
        assert_eq!(user.entries[0].source.kind, ConfigScope::User);
        assert_eq!(project.entries[0].source.kind, ConfigScope::Project);
    }

    #[test]
    fn separators_inside_fields_do_not_collide() {
        let with_path = |key: &str, path: &str| {
            vec![ConfigEntry::new(
                key,
                json!(1),
                ConfigSource {
                    kind: ConfigScope::User,
                    path: path.to_string(),
                    priority: 1,
                },
            )]
        };

        assert_ne!(
            content_hash(&with_path("a:b", "/p")),
            content_hash(&with_path("a", "b:/p"))
        );
        assert_ne!(
            content_hash(&with_path("k", "/a\nk")),
            content_hash(&[with_path("k", "/a"), with_path("k", "")].concat())
        );
    }

    #[test]
    fn dropped_result_frees_its_slot() {
        let resolver = InheritanceResolver::new();
        let chain = resolver.resolve(&sample());
        assert_eq!(resolver.len(), 1);

        drop(chain);
        assert!(resolver.is_empty());
    }

    #[test]
    fn reclaimed_slot_is_a_miss_on_lookup() {
        let resolver = InheritanceResolver::new();
        let chain = resolver.resolve(&sample());
        {
            // hook cannot take the lock, slot stays behind
            let _busy = resolver.lock();
            drop(chain);
        }
        assert_eq!(resolver.len(), 1);

        let again = resolver.resolve(&sample());
        assert_eq!(resolver.len(), 1);
        assert_eq!(again.resolved.get("model"), Some(&json!("sonnet")));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let resolver = InheritanceResolver::with_limits(2, Duration::from_secs(60));
        let sets: Vec<Vec<ConfigEntry>> = (0..3)
            .map(|i| vec![entry("k", json!(i), ConfigScope::User, 1)])
            .collect();

        let held: Vec<_> = sets.iter().map(|set| resolver.resolve(set)).collect();
        assert_eq!(resolver.len(), 2);
        assert_eq!(
            resolver.cached_hashes(),
            vec![held[1].content_hash().to_string(), held[2].content_hash().to_string()]
        );

        // the evicted set is recomputed even though its old result is alive
        let recomputed = resolver.resolve(&sets[0]);
        assert!(!Arc::ptr_eq(&recomputed, &held[0]));
        assert_eq!(recomputed.resolved, held[0].resolved);
    }

    #[test]
    fn expired_slots_are_purged_on_write() {
        let resolver = InheritanceResolver::with_limits(10, Duration::ZERO);
        let a = vec![entry("a", json!(1), ConfigScope::User, 1)];
        let b = vec![entry("b", json!(2), ConfigScope::User, 1)];

        let held_a = resolver.resolve(&a);
        let _held_b = resolver.resolve(&b);
        assert_eq!(resolver.cached_hashes(), vec![content_hash(&b)]);

        let again_a = resolver.resolve(&a);
        assert!(!Arc::ptr_eq(&held_a, &again_a));
    }

    #[test]
    fn invalidate_clears_without_touching_handles() {
        let resolver = InheritanceResolver::new();
        let chain = resolver.resolve(&sample());
        resolver.invalidate();

        assert!(resolver.is_empty());
        assert_eq!(chain.resolved.get("theme"), Some(&json!("dark")));

        let fresh = resolver.resolve(&sample());
        assert!(!Arc::ptr_eq(&chain, &fresh));
        drop(chain);
        // the old handle's hook must not remove the new slot
        assert_eq!(resolver.len(), 1);
    }
}
