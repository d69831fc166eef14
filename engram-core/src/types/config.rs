use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::enums::MemoryType;

/// Per-type decay rate and reliability baseline.
///
/// One of these exists per [`MemoryType`] inside [`EngramConfig`]; absent
/// entries fall back to the type's built-in default (see
/// [`TypeTuning::default_for`]). `decay_rate` here is `1 / base_decay_for_type`
/// in the specification's stability formula — a *larger* value means a
/// *more durable* memory, matching the spec's framing of facts and
/// procedures as long-lived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TypeTuning {
    /// Inverse decay rate (`1 / base_decay_for_type`) feeding [`crate::forgetting::stability`].
    pub decay_rate: f64,
    /// Baseline reliability in `[0, 1]` used by [`crate::confidence`].
    pub reliability_base: f64,
}

impl TypeTuning {
    /// The built-in tuning for a memory type, used when a config omits it.
    ///
    /// Facts and procedures are treated as durable (high `decay_rate`,
    /// high reliability); opinions and emotional memories decay fastest
    /// and carry the lowest baseline reliability, matching the
    /// specification's reliability ladder (factual 0.85, episodic 0.90,
    /// relational 0.75, emotional 0.95, procedural 0.90, opinion 0.60).
    #[must_use]
    pub const fn default_for(memory_type: MemoryType) -> Self {
        match memory_type {
            MemoryType::Factual => Self {
                decay_rate: 20.0,
                reliability_base: 0.85,
            },
            MemoryType::Episodic => Self {
                decay_rate: 5.0,
                reliability_base: 0.90,
            },
            MemoryType::Relational => Self {
                decay_rate: 10.0,
                reliability_base: 0.75,
            },
            MemoryType::Emotional => Self {
                decay_rate: 8.0,
                reliability_base: 0.95,
            },
            MemoryType::Procedural => Self {
                decay_rate: 25.0,
                reliability_base: 0.90,
            },
            MemoryType::Opinion => Self {
                decay_rate: 6.0,
                reliability_base: 0.60,
            },
        }
    }
}

/// Tunable parameters for ACT-R base-level and spreading activation
/// (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ActivationConfig {
    /// Decay exponent `d` in `B_i = ln(Sum (now - t_k)^-d)`.
    pub decay_exponent: f64,
    /// Weight applied to the fraction of matching context keywords.
    pub context_weight: f64,
    /// Weight applied to `importance` in the combined retrieval score.
    pub importance_weight: f64,
    /// Candidates scoring below this activation are dropped before ranking.
    pub min_activation: f64,
    /// Maximum hops for entity-graph expansion during `graph_expand`.
    pub entity_hop_cap: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            decay_exponent: 0.5,
            context_weight: 1.5,
            importance_weight: 0.5,
            min_activation: -10.0,
            entity_hop_cap: 2,
        }
    }
}

/// Tunable parameters for the Memory-Chain dual-trace consolidation step
/// (`spec.md` §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConsolidationConfig {
    /// Working-trace decay coefficient `mu_1`.
    pub mu1: f64,
    /// Core-trace decay coefficient `mu_2`.
    pub mu2: f64,
    /// Base transfer coefficient `alpha` (scaled per-memory by
    /// `0.2 + importance^2` into `alpha_eff`).
    pub alpha: f64,
    /// `working_strength` threshold above which an `L3_working` memory
    /// promotes into `L2_core`.
    pub promote_threshold: f64,
    /// Strength floor below which an `L3_working` memory (both traces)
    /// demotes straight into `L4_archive`.
    pub archive_threshold: f64,
    /// Total-strength floor below which an `L2_core` memory demotes into
    /// `L4_archive`.
    pub demote_threshold: f64,
    /// Fraction of `L4_archive` memories replayed per consolidation cycle,
    /// in `[0, 1]`.
    pub interleave_ratio: f64,
    /// Base boost added to a replayed archived memory's `core_strength`,
    /// scaled by `0.5 + importance`.
    pub replay_boost: f64,
    /// Multiplicative factor applied to every non-pinned memory's
    /// strengths during synaptic downscaling, in `(0, 1]`.
    pub downscaling_factor: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            mu1: 0.15,
            mu2: 0.005,
            alpha: 0.08,
            promote_threshold: 0.25,
            archive_threshold: 0.15,
            demote_threshold: 0.05,
            interleave_ratio: 0.3,
            replay_boost: 0.1,
            downscaling_factor: 0.95,
        }
    }
}

/// Tunable parameters for retrieval-induced forgetting, pruning, and
/// suppression (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ForgettingConfig {
    /// Effective-strength floor below which a non-pinned memory is
    /// eligible to be pruned (moved to `L4_archive`).
    pub prune_threshold: f64,
    /// Fractional reduction applied to a same-type, overlapping
    /// competitor's `working_strength` after a retrieval.
    pub suppression_factor: f64,
    /// Minimum token overlap, `|tokens(R) & tokens(C)| / |tokens(C)|`,
    /// required before a competitor is suppressed.
    pub overlap_threshold: f64,
    /// If true, apply retrieval-induced suppression to every result in a
    /// recall batch rather than only the top-ranked one (open question in
    /// `spec.md` §9; default follows the spec's "top result only" text).
    pub suppress_all_results: bool,
}

impl Default for ForgettingConfig {
    fn default() -> Self {
        Self {
            prune_threshold: 0.01,
            suppression_factor: 0.05,
            overlap_threshold: 0.3,
            suppress_all_results: false,
        }
    }
}

/// Tunable parameters for polarity-based reward shaping (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RewardConfig {
    /// Magnitude added to or subtracted from `importance` per reward event.
    pub magnitude: f64,
    /// Number of most-recently-accessed memories eligible for a reward
    /// event.
    pub recent_n: usize,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            magnitude: 0.15,
            recent_n: 3,
        }
    }
}

/// Tunable parameters for the Hebbian co-activation graph (`spec.md`
/// §4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HebbianConfig {
    /// Ceiling `HebbianLink.strength` saturates at; never exceeded.
    pub strength_ceiling: f64,
}

impl Default for HebbianConfig {
    fn default() -> Self {
        Self { strength_ceiling: 10.0 }
    }
}

/// Tunable parameters for the per-session bounded working-memory set
/// (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Maximum number of active ids retained per session (Miller's
    /// 7±2, default 7).
    pub capacity: usize,
    /// Window, in seconds, after which an inactive id is dropped.
    pub decay_window_secs: i64,
    /// Overlap ratio below which a probe recall is judged a topic
    /// change (and a full recall is run).
    pub overlap_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: 7,
            decay_window_secs: 300,
            overlap_threshold: 0.6,
        }
    }
}

/// Top-level configuration for an [`crate::memory::Engram`] instance.
///
/// # Examples
///
/// ```
/// use engram_core::EngramConfig;
///
/// let config = EngramConfig::chatbot();
/// assert!(config.session.capacity > 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngramConfig {
    /// Per-type overrides; missing types fall back to
    /// [`TypeTuning::default_for`].
    pub type_tuning: HashMap<MemoryType, TypeTuning>,
    /// Activation/retrieval tunables.
    pub activation: ActivationConfig,
    /// Consolidation tunables.
    pub consolidation: ConsolidationConfig,
    /// Forgetting and suppression tunables.
    pub forgetting: ForgettingConfig,
    /// Reward-shaping tunables.
    pub reward: RewardConfig,
    /// Hebbian/graph tunables.
    pub hebbian: HebbianConfig,
    /// Session working-memory tunables.
    pub session: SessionConfig,
}

impl EngramConfig {
    /// The tuning in effect for `memory_type`: an explicit override if
    /// present, otherwise the type's built-in default.
    #[must_use]
    pub fn tuning_for(&self, memory_type: MemoryType) -> TypeTuning {
        self.type_tuning
            .get(&memory_type)
            .copied()
            .unwrap_or_else(|| TypeTuning::default_for(memory_type))
    }

    /// A balanced preset for a conversational chatbot: short sessions,
    /// fast turnover, forgiving reward shaping. Spec defaults, unmodified.
    #[must_use]
    pub fn chatbot() -> Self {
        Self::default()
    }

    /// A preset for long-running task agents: a lower promotion bar and
    /// heavier replay so procedures consolidate and survive, plus a
    /// larger session for multi-step plans.
    #[must_use]
    pub fn task_agent() -> Self {
        let mut config = Self::default();
        config.consolidation.promote_threshold = 0.18;
        config.consolidation.interleave_ratio = 0.4;
        config.session.capacity = 12;
        config
    }

    /// A preset for a personal assistant held over long horizons: slower
    /// decay across all types (higher `decay_rate`), rarer pruning.
    #[must_use]
    pub fn personal_assistant() -> Self {
        let mut config = Self::default();
        for memory_type in MemoryType::all() {
            let mut tuning = TypeTuning::default_for(memory_type);
            tuning.decay_rate *= 2.0;
            config.type_tuning.insert(memory_type, tuning);
        }
        config.forgetting.prune_threshold = 0.005;
        config.session.capacity = 10;
        config
    }

    /// A preset for a researcher agent: emphasizes relational/factual
    /// reliability, wider session recall for cross-referencing, and a
    /// lower suppression overlap bar so contradictory findings surface
    /// suppression sooner.
    #[must_use]
    pub fn researcher() -> Self {
        let mut config = Self::default();
        config.session.capacity = 15;
        config.consolidation.interleave_ratio = 0.45;
        config.forgetting.overlap_threshold = 0.2;
        config
    }
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            type_tuning: HashMap::new(),
            activation: ActivationConfig::default(),
            consolidation: ConsolidationConfig::default(),
            forgetting: ForgettingConfig::default(),
            reward: RewardConfig::default(),
            hebbian: HebbianConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_for_falls_back_to_default_when_no_override() {
        let config = EngramConfig::default();
        assert_eq!(
            config.tuning_for(MemoryType::Factual),
            TypeTuning::default_for(MemoryType::Factual)
        );
    }

    #[test]
    fn tuning_for_honors_override() {
        let mut config = EngramConfig::default();
        config.type_tuning.insert(
            MemoryType::Factual,
            TypeTuning {
                decay_rate: 1.0,
                reliability_base: 0.99,
            },
        );
        let tuning = config.tuning_for(MemoryType::Factual);
        assert!((tuning.decay_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn personal_assistant_doubles_decay_rate_for_all_types() {
        let config = EngramConfig::personal_assistant();
        for memory_type in MemoryType::all() {
            let base = TypeTuning::default_for(memory_type);
            let tuned = config.tuning_for(memory_type);
            assert!((tuned.decay_rate - base.decay_rate * 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn presets_differ_in_session_capacity() {
        assert_ne!(
            EngramConfig::chatbot().session.capacity,
            EngramConfig::researcher().session.capacity
        );
    }
}
