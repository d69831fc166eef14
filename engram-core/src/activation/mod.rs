//! Activation scoring and the retrieval pipeline.
//!
//! Implements the specification's ACT-R-flavored retrieval ranking:
//! base-level activation from access-time history, spreading activation
//! from context-keyword overlap, and an importance boost, combined
//! additively into a single retrieval score used to rank full-text
//! candidates (optionally widened through Hebbian and entity-graph
//! expansion).

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::confidence;
use crate::hebbian;
use crate::store::StorageBackend;
use crate::types::{EngramConfig, Layer, MemoryEntry};
use crate::Result;

/// Minimum age, in seconds, used in the base-level denominator. Prevents a
/// just-now access from producing a division blow-up; the specification
/// clamps any non-positive age to `0.001`, which in wall-clock seconds is
/// effectively "now" — we use `0.001` directly to match it verbatim.
pub const MIN_AGE_SECONDS: f64 = 0.001;

/// English stop words elided from full-text queries before they reach the
/// backend, so common words don't dominate the prefilter.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "to", "of", "in", "on", "for",
    "and", "or", "with", "that", "this", "it", "as", "at", "by",
];

/// FTS meta-characters stripped from a query before tokenization, per
/// `spec.md` §4.2.
const FTS_META_CHARS: &[char] = &['?', '*', '-', '\'', '"', ','];

/// Strip FTS meta-characters, drop stop words, and lowercase a free-text
/// query, leaving the terms the backend's full-text index should match on.
///
/// # Examples
///
/// ```
/// use engram_core::activation::sanitize_query;
///
/// assert_eq!(sanitize_query("what is the deploy-key for?"), "deploy key");
/// ```
#[must_use]
pub fn sanitize_query(query: &str) -> String {
    let stripped: String = query.chars().filter(|c| !FTS_META_CHARS.contains(c)).collect();
    stripped
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(&word.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Base-level (ACT-R) activation from an access history.
///
/// `B_i = ln(Sum_k (now - t_k)^-d)`. Any `now - t_k <= 0` is clamped to
/// [`MIN_AGE_SECONDS`]. Returns `f64::NEG_INFINITY` for a memory with no
/// recorded accesses.
#[must_use]
pub fn base_level_activation(access_times: &[DateTime<Utc>], now: DateTime<Utc>, d: f64) -> f64 {
    if access_times.is_empty() {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = access_times
        .iter()
        .map(|&t| {
            let age_seconds = (now - t).num_milliseconds() as f64 / 1000.0;
            age_seconds.max(MIN_AGE_SECONDS).powf(-d)
        })
        .sum();
    sum.ln()
}

/// Spreading activation from a set of context keywords: the fraction of
/// `keywords` whose lowercased form appears as a substring of `content`
/// (lowercased), scaled by `context_weight`.
#[must_use]
pub fn spreading_activation(content: &str, keywords: &[String], context_weight: f64) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let lowered_content = content.to_lowercase();
    let matches = keywords
        .iter()
        .filter(|kw| lowered_content.contains(&kw.to_lowercase()))
        .count();
    context_weight * (matches as f64 / keywords.len() as f64)
}

/// A scored candidate returned from [`recall`].
#[derive(Debug, Clone)]
pub struct RankedMemory {
    /// The memory entry, as it stood before this recall's access-log
    /// update (callers that bump `access_count`/`last_accessed` do so on
    /// their own copy).
    pub entry: MemoryEntry,
    /// Base-level activation term.
    pub base_level: f64,
    /// Spreading-activation contribution from matching context keywords.
    pub spreading: f64,
    /// `base_level + spreading + importance_weight * importance`.
    pub activation: f64,
}

/// Options for [`recall`], mirroring `spec.md` §4.1's
/// `recall(query, {limit, min_confidence, graph_expand, include_archive,
/// context_keywords})`.
#[derive(Debug, Clone)]
pub struct RecallOptions {
    /// Maximum number of results to return.
    pub limit: usize,
    /// Minimum confidence score a candidate must clear to survive.
    pub min_confidence: f64,
    /// Whether to widen the candidate set through Hebbian neighbors and
    /// entity-graph traversal.
    pub graph_expand: bool,
    /// Whether to include `L4_archive` memories in the candidate set.
    pub include_archive: bool,
    /// Whether to include memories with `contradicted_by` set.
    pub include_contradicted: bool,
    /// Host-supplied keywords driving spreading activation and (when
    /// `graph_expand`) entity-graph widening.
    pub context_keywords: Vec<String>,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            min_confidence: 0.0,
            graph_expand: true,
            include_archive: false,
            include_contradicted: false,
            context_keywords: Vec::new(),
        }
    }
}

/// Run the retrieval procedure (`spec.md` §4.2 steps 1-5): build the
/// candidate set, score by activation, filter, and return the top
/// `options.limit`. Does not record access-log rows, strengthen Hebbian
/// links, apply retrieval-induced forgetting, or decorate confidence —
/// those are steps 6-9, owned by [`crate::memory::Engram::recall`] since
/// they mutate the store.
///
/// # Errors
///
/// Returns an error if the backend fails to read candidates, access
/// times, or graph/Hebbian links.
pub async fn recall(
    store: &dyn StorageBackend,
    config: &EngramConfig,
    query: &str,
    options: &RecallOptions,
    now: DateTime<Utc>,
) -> Result<Vec<RankedMemory>> {
    let sanitized = sanitize_query(query);
    let tokens_present = !sanitized.is_empty();

    let mut candidate_ids: HashSet<Uuid> = if tokens_present {
        store
            .search_fts(&sanitized, options.limit.saturating_mul(8).max(32))
            .await?
            .into_iter()
            .collect()
    } else {
        store
            .all()
            .await?
            .into_iter()
            .filter(|e| options.include_archive || e.layer != Layer::L4Archive)
            .map(|e| e.id)
            .collect()
    };

    if options.graph_expand {
        let seeds: Vec<Uuid> = candidate_ids.iter().copied().collect();
        for id in &seeds {
            for link in store.hebbian_neighbors(*id).await? {
                candidate_ids.insert(link.target_id);
            }
        }
        if !options.context_keywords.is_empty() {
            let entity_hits = hebbian::entities_to_memories(
                store,
                &options.context_keywords,
                config.activation.entity_hop_cap,
                options.limit.saturating_mul(4).max(16),
            )
            .await?;
            candidate_ids.extend(entity_hits);
        }
    }

    let mut ranked = Vec::with_capacity(candidate_ids.len());
    for id in candidate_ids {
        let Some(entry) = store.get(id).await? else {
            continue;
        };
        if !options.include_archive && entry.layer == Layer::L4Archive {
            continue;
        }
        if !options.include_contradicted && entry.contradicted_by.is_some() {
            continue;
        }

        let access_times = store.get_access_times(entry.id).await?;
        let base_level =
            base_level_activation(&access_times, now, config.activation.decay_exponent);
        let spreading = spreading_activation(
            &entry.content,
            &options.context_keywords,
            config.activation.context_weight,
        );
        let importance_term = config.activation.importance_weight * entry.importance;
        let activation = if base_level.is_finite() {
            base_level + spreading + importance_term
        } else {
            f64::NEG_INFINITY
        };

        if activation < config.activation.min_activation {
            continue;
        }
        let (confidence_score, _) = confidence::assess(&entry, config, now);
        if confidence_score < options.min_confidence {
            continue;
        }

        ranked.push(RankedMemory {
            entry,
            base_level,
            spreading,
            activation,
        });
    }

    ranked.sort_by(|a, b| {
        b.activation
            .partial_cmp(&a.activation)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.entry
                    .importance
                    .partial_cmp(&a.entry.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b.entry.last_accessed.cmp(&a.entry.last_accessed))
    });
    ranked.truncate(options.limit);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::{HebbianLink, MemoryType};
    use proptest::prelude::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn sanitize_query_drops_stop_words_meta_chars_and_lowercases() {
        assert_eq!(sanitize_query("What IS the Deploy-Key, for?"), "deploy key");
    }

    #[test]
    fn base_level_activation_is_neg_infinity_with_no_accesses() {
        assert_eq!(base_level_activation(&[], Utc::now(), 0.5), f64::NEG_INFINITY);
    }

    #[test]
    fn base_level_activation_increases_with_more_recent_access() {
        let now = Utc::now();
        let old = vec![now - chrono::Duration::days(30)];
        let recent = vec![now - chrono::Duration::seconds(10)];
        assert!(base_level_activation(&recent, now, 0.5) > base_level_activation(&old, now, 0.5));
    }

    #[test]
    fn base_level_activation_is_monotone_in_access_count() {
        let now = Utc::now();
        let one = vec![now - chrono::Duration::seconds(100)];
        let three = vec![
            now - chrono::Duration::seconds(100),
            now - chrono::Duration::seconds(200),
            now - chrono::Duration::seconds(300),
        ];
        assert!(base_level_activation(&three, now, 0.5) > base_level_activation(&one, now, 0.5));
    }

    #[test]
    fn spreading_activation_scales_by_matched_fraction() {
        let keywords = vec!["apollo".to_string(), "budget".to_string()];
        let full = spreading_activation("apollo budget review", &keywords, 1.5);
        let half = spreading_activation("apollo kickoff", &keywords, 1.5);
        assert!((full - 1.5).abs() < 1e-9);
        assert!((half - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn recall_ranks_more_recently_accessed_memory_first() {
        let store = InMemoryStore::new();
        let config = EngramConfig::default();
        let now = Utc::now();

        let old = MemoryEntry::new(
            "deploy key rotation policy".to_string(),
            MemoryType::Factual,
            0.5,
            StdHashMap::new(),
            false,
            now,
        );
        let fresh = MemoryEntry::new(
            "deploy key rotation schedule".to_string(),
            MemoryType::Factual,
            0.5,
            StdHashMap::new(),
            false,
            now,
        );
        store.insert(&old).await.unwrap();
        store.insert(&fresh).await.unwrap();
        store.record_access(old.id, now - chrono::Duration::days(10)).await.unwrap();
        store.record_access(fresh.id, now - chrono::Duration::seconds(5)).await.unwrap();

        let options = RecallOptions { limit: 10, ..Default::default() };
        let ranked = recall(&store, &config, "deploy key", &options, now).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].entry.id, fresh.id);
    }

    #[tokio::test]
    async fn recall_excludes_archived_by_default() {
        let store = InMemoryStore::new();
        let config = EngramConfig::default();
        let now = Utc::now();

        let mut archived = MemoryEntry::new(
            "archived fact about deploy".to_string(),
            MemoryType::Factual,
            0.5,
            StdHashMap::new(),
            false,
            now,
        );
        archived.layer = crate::types::Layer::L4Archive;
        store.insert(&archived).await.unwrap();
        store.record_access(archived.id, now).await.unwrap();

        let options = RecallOptions { limit: 10, ..Default::default() };
        let ranked = recall(&store, &config, "deploy", &options, now).await.unwrap();
        assert!(ranked.is_empty());

        let options_with_archive = RecallOptions {
            limit: 10,
            include_archive: true,
            ..Default::default()
        };
        let ranked = recall(&store, &config, "deploy", &options_with_archive, now).await.unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[tokio::test]
    async fn recall_excludes_contradicted_memories_by_default() {
        let store = InMemoryStore::new();
        let config = EngramConfig::default();
        let now = Utc::now();
        let mut contradicted = MemoryEntry::new(
            "the price is ten dollars".to_string(),
            MemoryType::Factual,
            0.5,
            StdHashMap::new(),
            false,
            now,
        );
        contradicted.contradicted_by = Some(Uuid::new_v4());
        store.insert(&contradicted).await.unwrap();
        store.record_access(contradicted.id, now).await.unwrap();

        let options = RecallOptions { limit: 10, ..Default::default() };
        let ranked = recall(&store, &config, "price", &options, now).await.unwrap();
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn empty_query_falls_back_to_full_non_archived_scan() {
        let store = InMemoryStore::new();
        let config = EngramConfig::default();
        let now = Utc::now();
        let entry = MemoryEntry::new(
            "unrelated content entirely".to_string(),
            MemoryType::Factual,
            0.5,
            StdHashMap::new(),
            false,
            now,
        );
        store.insert(&entry).await.unwrap();
        store.record_access(entry.id, now).await.unwrap();

        let options = RecallOptions { limit: 10, ..Default::default() };
        let ranked = recall(&store, &config, "the a of", &options, now).await.unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[tokio::test]
    async fn graph_expand_widens_candidates_through_hebbian_neighbor() {
        let store = InMemoryStore::new();
        let config = EngramConfig::default();
        let now = Utc::now();

        let anchor = MemoryEntry::new(
            "project apollo kickoff".to_string(),
            MemoryType::Episodic,
            0.5,
            StdHashMap::new(),
            false,
            now,
        );
        let linked = MemoryEntry::new(
            "budget constraints for q3".to_string(),
            MemoryType::Factual,
            0.5,
            StdHashMap::new(),
            false,
            now,
        );
        store.insert(&anchor).await.unwrap();
        store.insert(&linked).await.unwrap();
        store.record_access(anchor.id, now - chrono::Duration::seconds(5)).await.unwrap();
        store.record_access(linked.id, now - chrono::Duration::seconds(5)).await.unwrap();
        store
            .upsert_hebbian_link(&HebbianLink {
                source_id: anchor.id,
                target_id: linked.id,
                strength: 2.0,
                coactivation_count: 4,
                created_at: now,
            })
            .await
            .unwrap();

        let options = RecallOptions { limit: 10, graph_expand: true, ..Default::default() };
        let ranked = recall(&store, &config, "apollo", &options, now).await.unwrap();
        assert!(ranked.iter().any(|r| r.entry.id == linked.id));
    }

    proptest! {
        /// Base-level activation is monotone in access count at a fixed
        /// `now` and a fixed per-access age: repeating the same access age
        /// more times can only raise (never lower) the sum of recency
        /// terms, and hence its log.
        #[test]
        fn base_level_activation_is_monotone_in_access_count_proptest(
            age_seconds in 1.0f64..1_000_000.0,
            extra_accesses in 0usize..20,
            d in 0.05f64..2.0,
        ) {
            let now = Utc::now();
            let age = chrono::Duration::milliseconds((age_seconds * 1000.0) as i64);
            let fewer: Vec<_> = std::iter::repeat(now - age).take(1).collect();
            let more: Vec<_> = std::iter::repeat(now - age).take(1 + extra_accesses).collect();

            let fewer_activation = base_level_activation(&fewer, now, d);
            let more_activation = base_level_activation(&more, now, d);
            prop_assert!(more_activation >= fewer_activation);
        }
    }
}
