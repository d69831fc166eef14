//! Confidence scoring: how much a host should trust a recalled memory.
//!
//! Combines a per-type reliability baseline (discounted by contradiction,
//! boosted by pinning and importance) with the memory's current salience
//! (effective strength, normalized) into a single weighted score, then
//! labels it against a fixed ladder so hosts don't have to invent their own
//! thresholds.

use chrono::{DateTime, Utc};

use crate::forgetting::effective_strength;
use crate::types::{EngramConfig, MemoryEntry};

/// Labeled confidence tiers, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfidenceLabel {
    /// Score below `0.4`.
    Vague,
    /// Score in `[0.4, 0.6)`.
    Uncertain,
    /// Score in `[0.6, 0.8)`.
    Likely,
    /// Score `>= 0.8`.
    Certain,
}

impl ConfidenceLabel {
    /// Classify a raw score in `[0, 1]` against the ladder.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ConfidenceLabel::Certain
        } else if score >= 0.6 {
            ConfidenceLabel::Likely
        } else if score >= 0.4 {
            ConfidenceLabel::Uncertain
        } else {
            ConfidenceLabel::Vague
        }
    }
}

/// Multiplicative reliability penalty applied when a memory has an active
/// `contradicted_by` pointer (something else contradicts it).
pub const CONTRADICTION_FACTOR: f64 = 0.3;

/// Floor a pinned memory's reliability is raised to, reflecting that a
/// host explicitly vouched for it.
pub const PINNED_FLOOR: f64 = 0.95;

/// Weight given to reliability (vs. salience) in the combined score.
pub const RELIABILITY_WEIGHT: f64 = 0.7;

/// Per-type reliability baseline, discounted `* 0.3` when `contradicted_by`
/// is set, raised to `max(base, 0.95)` when pinned, and boosted by
/// `0.1 * importance`. Clamped to `[0, 1]`.
#[must_use]
pub fn reliability(entry: &MemoryEntry, config: &EngramConfig) -> f64 {
    let mut base = config.tuning_for(entry.memory_type).reliability_base;
    if entry.contradicted_by.is_some() {
        base *= CONTRADICTION_FACTOR;
    }
    if entry.pinned {
        base = base.max(PINNED_FLOOR);
    }
    base += 0.1 * entry.importance;
    base.clamp(0.0, 1.0)
}

/// Salience via the sigmoid fallback: `2*sigmoid(2E) - 1`, i.e. `tanh(E)`.
/// Used when no store-wide maximum effective strength is available.
#[must_use]
pub fn salience(entry: &MemoryEntry, config: &EngramConfig, now: DateTime<Utc>) -> f64 {
    let e = effective_strength(entry, config, now);
    2.0 / (1.0 + (-2.0 * e).exp()) - 1.0
}

/// Salience normalized against the maximum effective strength observed
/// across the store: `E / max_e`, clamped to `[0, 1]`. Falls back to the
/// sigmoid form if `max_e <= 0`.
#[must_use]
pub fn salience_normalized(
    entry: &MemoryEntry,
    config: &EngramConfig,
    now: DateTime<Utc>,
    max_e: f64,
) -> f64 {
    if max_e <= 0.0 {
        return salience(entry, config, now);
    }
    (effective_strength(entry, config, now) / max_e).clamp(0.0, 1.0)
}

/// Combined confidence score: `0.7 * reliability + 0.3 * salience`.
#[must_use]
pub fn score(entry: &MemoryEntry, config: &EngramConfig, now: DateTime<Utc>) -> f64 {
    RELIABILITY_WEIGHT * reliability(entry, config)
        + (1.0 - RELIABILITY_WEIGHT) * salience(entry, config, now)
}

/// Combined confidence score using store-relative salience normalization.
#[must_use]
pub fn score_normalized(
    entry: &MemoryEntry,
    config: &EngramConfig,
    now: DateTime<Utc>,
    max_e: f64,
) -> f64 {
    RELIABILITY_WEIGHT * reliability(entry, config)
        + (1.0 - RELIABILITY_WEIGHT) * salience_normalized(entry, config, now, max_e)
}

/// Convenience: score (sigmoid-fallback salience) and label together.
#[must_use]
pub fn assess(entry: &MemoryEntry, config: &EngramConfig, now: DateTime<Utc>) -> (f64, ConfidenceLabel) {
    let s = score(entry, config, now);
    (s, ConfidenceLabel::from_score(s))
}

/// Convenience: score (store-normalized salience) and label together.
#[must_use]
pub fn assess_normalized(
    entry: &MemoryEntry,
    config: &EngramConfig,
    now: DateTime<Utc>,
    max_e: f64,
) -> (f64, ConfidenceLabel) {
    let s = score_normalized(entry, config, now, max_e);
    (s, ConfidenceLabel::from_score(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryType;
    use std::collections::HashMap;

    fn entry() -> MemoryEntry {
        MemoryEntry::new(
            "x".to_string(),
            MemoryType::Factual,
            0.5,
            HashMap::new(),
            false,
            Utc::now(),
        )
    }

    #[test]
    fn contradicted_by_lowers_reliability_multiplicatively() {
        let config = EngramConfig::default();
        let mut contradicted = entry();
        contradicted.contradicted_by = Some(uuid::Uuid::new_v4());
        let base = config.tuning_for(MemoryType::Factual).reliability_base;
        let expected = (base * CONTRADICTION_FACTOR + 0.1 * contradicted.importance).clamp(0.0, 1.0);
        assert!((reliability(&contradicted, &config) - expected).abs() < 1e-9);
        assert!(reliability(&contradicted, &config) < reliability(&entry(), &config));
    }

    #[test]
    fn contradicts_alone_does_not_lower_reliability() {
        let config = EngramConfig::default();
        let mut contradicts_other = entry();
        contradicts_other.contradicts = Some(uuid::Uuid::new_v4());
        assert!((reliability(&contradicts_other, &config) - reliability(&entry(), &config)).abs() < 1e-9);
    }

    #[test]
    fn pinned_raises_reliability_to_at_least_the_floor() {
        let config = EngramConfig::default();
        let mut pinned = entry();
        pinned.memory_type = MemoryType::Opinion;
        pinned.pinned = true;
        assert!(reliability(&pinned, &config) >= PINNED_FLOOR);
    }

    #[test]
    fn reliability_is_always_clamped_to_unit_interval() {
        let config = EngramConfig::default();
        let mut low = entry();
        low.memory_type = MemoryType::Opinion;
        low.contradicted_by = Some(uuid::Uuid::new_v4());
        low.importance = 0.0;
        let r = reliability(&low, &config);
        assert!((0.0..=1.0).contains(&r));
    }

    #[test]
    fn confidence_label_thresholds_match_ladder() {
        assert_eq!(ConfidenceLabel::from_score(0.9), ConfidenceLabel::Certain);
        assert_eq!(ConfidenceLabel::from_score(0.65), ConfidenceLabel::Likely);
        assert_eq!(ConfidenceLabel::from_score(0.45), ConfidenceLabel::Uncertain);
        assert_eq!(ConfidenceLabel::from_score(0.1), ConfidenceLabel::Vague);
    }

    #[test]
    fn fresh_strong_memory_scores_higher_than_stale_weak_one() {
        let config = EngramConfig::default();
        let now = Utc::now();
        let mut fresh = entry();
        fresh.working_strength = 1.0;
        fresh.last_accessed = now;

        let mut stale = entry();
        stale.working_strength = 0.01;
        stale.last_accessed = now - chrono::Duration::days(365);

        assert!(score(&fresh, &config, now) > score(&stale, &config, now));
    }

    #[test]
    fn normalized_salience_matches_ratio_to_store_max() {
        let config = EngramConfig::default();
        let now = Utc::now();
        let mut e = entry();
        e.working_strength = 0.5;
        e.core_strength = 0.0;
        let max_e = effective_strength(&e, &config, now) * 2.0;
        let normalized = salience_normalized(&e, &config, now, max_e);
        assert!((normalized - 0.5).abs() < 1e-6);
    }
}
