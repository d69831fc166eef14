//! Forgetting: Ebbinghaus-style stability/retrievability decay,
//! retrieval-induced suppression of same-type competitors, non-destructive
//! pruning into `L4_archive`, and explicit hard deletion.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::store::StorageBackend;
use crate::types::{EngramConfig, Layer, MemoryEntry};
use crate::{Error, Result};

/// Stability `S`: how resistant a memory is to decay, given its type's
/// base decay rate, how often it has been accessed, its importance, and
/// how many consolidation cycles have folded it toward `L2_core`.
///
/// `S = decay_rate * (1 + 0.5*ln(1 + access_count)) * (0.5 + importance) *
/// (1 + 0.2*consolidation_count)`.
#[must_use]
pub fn stability(entry: &MemoryEntry, config: &EngramConfig) -> f64 {
    let decay_rate = config.tuning_for(entry.memory_type).decay_rate;
    let access_term = 1.0 + 0.5 * (1.0 + entry.access_count as f64).ln();
    let importance_term = 0.5 + entry.importance;
    let consolidation_term = 1.0 + 0.2 * entry.consolidation_count as f64;
    decay_rate * access_term * importance_term * consolidation_term
}

/// Retrievability `R(t) = exp(-t_days / S)`, where `t_days` is the time
/// since `last_accessed`. Returns `1.0` for pinned memories regardless of
/// age.
#[must_use]
pub fn retrievability(entry: &MemoryEntry, config: &EngramConfig, now: DateTime<Utc>) -> f64 {
    if entry.pinned {
        return 1.0;
    }
    let age_days = ((now - entry.last_accessed).num_milliseconds() as f64 / 86_400_000.0).max(0.0);
    (-age_days / stability(entry, config)).exp()
}

/// Effective strength used for ranking and pruning decisions:
/// `(working_strength + core_strength) * R(t)`.
#[must_use]
pub fn effective_strength(entry: &MemoryEntry, config: &EngramConfig, now: DateTime<Utc>) -> f64 {
    entry.raw_strength() * retrievability(entry, config, now)
}

/// Whether a memory is eligible to be pruned into `L4_archive`: not
/// pinned, and its effective strength has fallen below
/// [`crate::types::ForgettingConfig::prune_threshold`]. Layer-independent —
/// an `L2_core` memory that has gone quiet is just as eligible as one
/// already in `L3_working`.
#[must_use]
pub fn should_forget(entry: &MemoryEntry, config: &EngramConfig, now: DateTime<Utc>) -> bool {
    !entry.pinned && effective_strength(entry, config, now) < config.forgetting.prune_threshold
}

/// Lowercased, whitespace-tokenized, deduplicated words in `content`.
fn tokens(content: &str) -> HashSet<String> {
    content.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// Asymmetric token overlap of a retrieved memory against a competitor:
/// `|tokens(retrieved) & tokens(competitor)| / |tokens(competitor)|`. `0.0`
/// if the competitor has no tokens.
#[must_use]
pub fn token_overlap(retrieved: &str, competitor: &str) -> f64 {
    let competitor_tokens = tokens(competitor);
    if competitor_tokens.is_empty() {
        return 0.0;
    }
    let retrieved_tokens = tokens(retrieved);
    let shared = retrieved_tokens.intersection(&competitor_tokens).count();
    shared as f64 / competitor_tokens.len() as f64
}

/// Apply retrieval-induced forgetting: after `retrieved` is recalled, any
/// non-pinned memory of the same type whose content overlaps `retrieved`'s
/// above [`crate::types::ForgettingConfig::overlap_threshold`] has its
/// `working_strength` (only; `core_strength` is untouched) multiplied by
/// `1 - suppression_factor * overlap`.
///
/// Scans the whole store for same-type competitors rather than following
/// explicit `contradicts` links — two memories can compete for retrieval
/// without ever having been marked as contradicting each other.
///
/// # Errors
///
/// Returns an error if the backend read or write fails.
pub async fn suppress_competitors(
    store: &dyn StorageBackend,
    config: &EngramConfig,
    retrieved: &MemoryEntry,
) -> Result<Vec<Uuid>> {
    let mut suppressed = Vec::new();
    for mut competitor in store.all().await? {
        if competitor.id == retrieved.id
            || competitor.pinned
            || competitor.memory_type != retrieved.memory_type
        {
            continue;
        }
        let overlap = token_overlap(&retrieved.content, &competitor.content);
        if overlap <= config.forgetting.overlap_threshold {
            continue;
        }
        competitor.working_strength *= 1.0 - config.forgetting.suppression_factor * overlap;
        store.update(&competitor).await?;
        suppressed.push(competitor.id);
    }
    Ok(suppressed)
}

/// Non-destructive sweep: move every memory for which [`should_forget`]
/// holds into `L4_archive` (a no-op for ones already there). Returns the
/// ids moved. Never deletes anything — use [`forget`] for hard deletion.
///
/// # Errors
///
/// Returns an error if the backend read or write fails.
pub async fn prune(
    store: &dyn StorageBackend,
    config: &EngramConfig,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>> {
    let mut moved = Vec::new();
    for mut entry in store.all().await? {
        if entry.layer != Layer::L4Archive && should_forget(&entry, config, now) {
            entry.layer = Layer::L4Archive;
            store.update(&entry).await?;
            moved.push(entry.id);
        }
    }
    Ok(moved)
}

/// Explicit hard delete of a single memory: removes it and its derived
/// rows (access log, graph links, Hebbian links both directions), and
/// nulls out any other memory's `contradicts`/`contradicted_by` pointing
/// at it so no dangling reference survives.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if `id` does not exist, or an error if the
/// backend read or write fails.
pub async fn forget(store: &dyn StorageBackend, id: Uuid) -> Result<()> {
    if store.get(id).await?.is_none() {
        return Err(Error::NotFound(id));
    }
    for mut other in store.all().await? {
        if other.id == id {
            continue;
        }
        let mut changed = false;
        if other.contradicts == Some(id) {
            other.contradicts = None;
            changed = true;
        }
        if other.contradicted_by == Some(id) {
            other.contradicted_by = None;
            changed = true;
        }
        if changed {
            store.update(&other).await?;
        }
    }
    store.delete(id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::MemoryType;
    use std::collections::HashMap;

    fn entry_with_strength(strength: f64, layer: Layer, last_accessed: DateTime<Utc>) -> MemoryEntry {
        let mut entry = MemoryEntry::new(
            "x".to_string(),
            MemoryType::Episodic,
            0.3,
            HashMap::new(),
            false,
            last_accessed,
        );
        entry.layer = layer;
        entry.working_strength = strength;
        entry.core_strength = 0.0;
        entry.last_accessed = last_accessed;
        entry
    }

    #[test]
    fn pinned_memories_have_full_retrievability() {
        let now = Utc::now();
        let mut entry = entry_with_strength(0.01, Layer::L4Archive, now - chrono::Duration::days(365));
        entry.pinned = true;
        assert_eq!(retrievability(&entry, &EngramConfig::default(), now), 1.0);
    }

    #[test]
    fn retrievability_decreases_with_age() {
        let now = Utc::now();
        let fresh = entry_with_strength(1.0, Layer::L3Working, now);
        let old = entry_with_strength(1.0, Layer::L3Working, now - chrono::Duration::days(90));
        let config = EngramConfig::default();
        assert!(retrievability(&fresh, &config, now) > retrievability(&old, &config, now));
    }

    #[test]
    fn stability_increases_with_access_count_and_consolidation() {
        let config = EngramConfig::default();
        let mut entry = entry_with_strength(1.0, Layer::L3Working, Utc::now());
        let base = stability(&entry, &config);
        entry.access_count = 10;
        entry.consolidation_count = 3;
        assert!(stability(&entry, &config) > base);
    }

    #[test]
    fn should_forget_applies_regardless_of_layer() {
        let now = Utc::now();
        let config = EngramConfig::default();
        let weak_working = entry_with_strength(0.0001, Layer::L3Working, now - chrono::Duration::days(400));
        assert!(should_forget(&weak_working, &config, now));

        let weak_archived = entry_with_strength(0.0001, Layer::L4Archive, now - chrono::Duration::days(400));
        assert!(should_forget(&weak_archived, &config, now));
    }

    #[test]
    fn pinned_memory_is_never_forgotten() {
        let now = Utc::now();
        let mut entry = entry_with_strength(0.0001, Layer::L4Archive, now - chrono::Duration::days(1000));
        entry.pinned = true;
        assert!(!should_forget(&entry, &EngramConfig::default(), now));
    }

    #[test]
    fn token_overlap_is_asymmetric_over_competitor_length() {
        let overlap = token_overlap("the price is ten dollars exactly", "the price is ten");
        assert!((overlap - 1.0).abs() < 1e-9);
        let reverse = token_overlap("the price is ten", "the price is ten dollars exactly");
        assert!(reverse < 1.0);
    }

    #[tokio::test]
    async fn suppress_competitors_weakens_only_working_strength_of_overlapping_same_type_memory() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let config = EngramConfig::default();

        let winner = MemoryEntry::new(
            "the price of the widget is ten dollars".to_string(),
            MemoryType::Factual,
            0.5,
            HashMap::new(),
            false,
            now,
        );
        let mut loser = MemoryEntry::new(
            "the price of the widget is eight dollars".to_string(),
            MemoryType::Factual,
            0.5,
            HashMap::new(),
            false,
            now,
        );
        loser.core_strength = 0.4;
        let loser_core_before = loser.core_strength;

        store.insert(&winner).await.unwrap();
        store.insert(&loser).await.unwrap();

        let suppressed = suppress_competitors(&store, &config, &winner).await.unwrap();
        assert_eq!(suppressed, vec![loser.id]);

        let loser_after = store.get(loser.id).await.unwrap().unwrap();
        assert!(loser_after.working_strength < loser.working_strength);
        assert_eq!(loser_after.core_strength, loser_core_before);
    }

    #[tokio::test]
    async fn suppress_competitors_ignores_different_memory_types() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let config = EngramConfig::default();

        let winner = MemoryEntry::new(
            "the price of the widget is ten dollars".to_string(),
            MemoryType::Factual,
            0.5,
            HashMap::new(),
            false,
            now,
        );
        let other_type = MemoryEntry::new(
            "the price of the widget is ten dollars".to_string(),
            MemoryType::Opinion,
            0.5,
            HashMap::new(),
            false,
            now,
        );
        store.insert(&winner).await.unwrap();
        store.insert(&other_type).await.unwrap();

        let suppressed = suppress_competitors(&store, &config, &winner).await.unwrap();
        assert!(suppressed.is_empty());
    }

    #[tokio::test]
    async fn prune_moves_weak_non_pinned_memories_to_archive_without_deleting() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let config = EngramConfig::default();

        let keep = entry_with_strength(1.0, Layer::L2Core, now);
        let move_to_archive = entry_with_strength(0.0001, Layer::L3Working, now - chrono::Duration::days(500));
        store.insert(&keep).await.unwrap();
        store.insert(&move_to_archive).await.unwrap();

        let moved = prune(&store, &config, now).await.unwrap();
        assert_eq!(moved, vec![move_to_archive.id]);

        let archived = store.get(move_to_archive.id).await.unwrap().unwrap();
        assert_eq!(archived.layer, Layer::L4Archive);
        assert!(store.get(keep.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn prune_never_touches_pinned_memories() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let config = EngramConfig::default();

        let mut pinned = entry_with_strength(0.0001, Layer::L3Working, now - chrono::Duration::days(500));
        pinned.pinned = true;
        store.insert(&pinned).await.unwrap();

        let moved = prune(&store, &config, now).await.unwrap();
        assert!(moved.is_empty());
    }

    #[tokio::test]
    async fn forget_hard_deletes_and_nulls_cross_references() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let mut a = MemoryEntry::new("a".to_string(), MemoryType::Factual, 0.5, HashMap::new(), false, now);
        let mut b = MemoryEntry::new("b".to_string(), MemoryType::Factual, 0.5, HashMap::new(), false, now);
        a.contradicts = Some(b.id);
        b.contradicted_by = Some(a.id);
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        forget(&store, b.id).await.unwrap();

        assert!(store.get(b.id).await.unwrap().is_none());
        let a_after = store.get(a.id).await.unwrap().unwrap();
        assert_eq!(a_after.contradicts, None);
    }

    #[tokio::test]
    async fn forget_unknown_id_errors() {
        let store = InMemoryStore::new();
        let result = forget(&store, Uuid::new_v4()).await;
        assert!(result.is_err());
    }
}
