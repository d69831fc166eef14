//! Dual-trace (Memory-Chain) consolidation.
//!
//! Each cycle steps every non-pinned `L3_working` memory's
//! `working_strength`/`core_strength` pair through a discretized
//! differential-equation transfer, decays `L2_core` memories' core trace on
//! its own slower clock, replays a sample of `L4_archive` memories with a
//! flat core-strength boost, then rebalances every touched memory across
//! layers. Synaptic downscaling of memory strengths is a separate,
//! independently callable step — see [`synaptic_downscale`] — not part of
//! the automatic cycle.
//!
//! Only one cycle may run at a time per [`ConsolidationEngine`]; a second
//! call made while one is in flight returns
//! [`crate::error::Error::StorageFailure`] rather than blocking.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::error::Error;
use crate::store::StorageBackend;
use crate::types::{EngramConfig, Layer, MemoryEntry};
use crate::Result;

/// Outcome of a single consolidation cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidationStats {
    /// `L3_working` memories stepped through the transfer equation.
    pub working_stepped: usize,
    /// `L2_core` memories decayed on the core-only clock.
    pub core_decayed: usize,
    /// `L4_archive` memories selected for interleaved replay.
    pub replayed: usize,
    /// Memories promoted into `L2_core` this cycle (from `L3_working` or,
    /// via a strong replay, from `L4_archive`).
    pub promoted: Vec<Uuid>,
    /// Memories archived into `L4_archive` this cycle (from `L3_working`
    /// or demoted from `L2_core`).
    pub archived: Vec<Uuid>,
    /// Pinned memories forced into `L2_core` this cycle.
    pub pinned_fixed: Vec<Uuid>,
}

/// One discretized step of the Memory-Chain transfer equations for an
/// `L3_working` memory: `alpha_eff = alpha * (0.2 + importance^2)`, add
/// `alpha_eff * working_strength * dt` to `core_strength`, then decay both
/// traces by their own exponential factor: `working_strength *=
/// exp(-mu1*dt)`, `core_strength *= exp(-mu2*dt)`.
fn step_working(entry: &mut MemoryEntry, config: &EngramConfig, dt: f64) {
    let c = &config.consolidation;
    let alpha_eff = c.alpha * (0.2 + entry.importance.powi(2));
    entry.core_strength += alpha_eff * entry.working_strength * dt;
    entry.working_strength *= (-c.mu1 * dt).exp();
    entry.core_strength *= (-c.mu2 * dt).exp();
}

/// Core-only decay for an `L2_core` memory: `core_strength *=
/// exp(-mu2*dt)`. `working_strength` is left untouched — once a memory has
/// promoted, it no longer receives working-trace input.
fn step_core_only(entry: &mut MemoryEntry, config: &EngramConfig, dt: f64) {
    entry.core_strength *= (-config.consolidation.mu2 * dt).exp();
}

/// Coordinates consolidation cycles against a [`StorageBackend`].
///
/// Holds an [`AtomicBool`] single-execution guard so a host can safely call
/// [`ConsolidationEngine::run_cycle`] from a periodic task without risking
/// two overlapping cycles corrupting each other's trace updates.
pub struct ConsolidationEngine {
    is_running: AtomicBool,
}

impl Default for ConsolidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolidationEngine {
    /// A new engine, not currently running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            is_running: AtomicBool::new(false),
        }
    }

    /// Whether a cycle is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Run one consolidation cycle, stepping the transfer equations by
    /// `dt_days` (fractional days; `1.0` is one full cycle).
    ///
    /// `seed` makes replay sampling deterministic for tests and for
    /// reproducing a host's consolidation history; hosts in production
    /// typically derive it from the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageFailure`] if a cycle is already running, or
    /// any error the backend raises while reading or writing memories.
    #[tracing::instrument(skip(self, store, config))]
    pub async fn run_cycle(
        &self,
        store: &dyn StorageBackend,
        config: &EngramConfig,
        now: DateTime<Utc>,
        dt_days: f64,
        seed: u64,
    ) -> Result<ConsolidationStats> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::StorageFailure(
                "a consolidation cycle is already running".to_string(),
            ));
        }

        let result = self.run_cycle_inner(store, config, now, dt_days, seed).await;
        self.is_running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_cycle_inner(
        &self,
        store: &dyn StorageBackend,
        config: &EngramConfig,
        now: DateTime<Utc>,
        dt_days: f64,
        seed: u64,
    ) -> Result<ConsolidationStats> {
        let c = &config.consolidation;
        let mut stats = ConsolidationStats::default();
        let all = store.all().await?;

        for mut entry in all.clone() {
            if entry.pinned && entry.layer != Layer::L2Core {
                entry.layer = Layer::L2Core;
                stats.pinned_fixed.push(entry.id);
                store.update(&entry).await?;
            }
        }

        for mut entry in all {
            if entry.pinned {
                continue;
            }
            match entry.layer {
                Layer::L3Working => {
                    step_working(&mut entry, config, dt_days);
                    entry.last_consolidated = now;
                    entry.consolidation_count += 1;
                    stats.working_stepped += 1;
                }
                Layer::L2Core => {
                    step_core_only(&mut entry, config, dt_days);
                    entry.last_consolidated = now;
                    entry.consolidation_count += 1;
                    stats.core_decayed += 1;
                }
                Layer::L4Archive => continue,
            }
            store.update(&entry).await?;
        }

        let archived_ids: Vec<Uuid> = store
            .all()
            .await?
            .into_iter()
            .filter(|e| e.layer == Layer::L4Archive && !e.pinned)
            .map(|e| e.id)
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut shuffled = archived_ids.clone();
        shuffled.shuffle(&mut rng);
        let replay_count = ((shuffled.len() as f64) * c.interleave_ratio).round() as usize;
        let replay_set: HashSet<Uuid> = shuffled.into_iter().take(replay_count).collect();

        for id in &replay_set {
            let Some(mut entry) = store.get(*id).await? else {
                continue;
            };
            entry.core_strength += c.replay_boost * (0.5 + entry.importance);
            entry.last_consolidated = now;
            stats.replayed += 1;
            if entry.core_strength >= c.promote_threshold {
                entry.layer = Layer::L2Core;
                stats.promoted.push(entry.id);
            }
            store.update(&entry).await?;
        }

        for mut entry in store.all().await? {
            if entry.pinned {
                continue;
            }
            match entry.layer {
                Layer::L3Working => {
                    if entry.core_strength >= c.promote_threshold {
                        entry.layer = Layer::L2Core;
                        stats.promoted.push(entry.id);
                        store.update(&entry).await?;
                    } else if entry.working_strength < c.archive_threshold
                        && entry.core_strength < c.archive_threshold
                    {
                        entry.layer = Layer::L4Archive;
                        stats.archived.push(entry.id);
                        store.update(&entry).await?;
                    }
                }
                Layer::L2Core => {
                    if entry.working_strength + entry.core_strength < c.demote_threshold {
                        entry.layer = Layer::L4Archive;
                        stats.archived.push(entry.id);
                        store.update(&entry).await?;
                    }
                }
                Layer::L4Archive => {}
            }
        }

        Ok(stats)
    }
}

/// Multiply both strengths of every non-pinned memory by `factor` (in
/// `(0, 1]`). Keeps unbounded reward/replay growth in check. Callable
/// independently of [`ConsolidationEngine::run_cycle`].
///
/// # Errors
///
/// Returns [`Error::ConfigError`] if `factor` is not in `(0, 1]`, or an
/// error if the backend read or write fails.
pub async fn synaptic_downscale(store: &dyn StorageBackend, factor: f64) -> Result<usize> {
    if factor <= 0.0 || factor > 1.0 {
        return Err(Error::ConfigError(format!(
            "downscaling factor must be in (0, 1], got {factor}"
        )));
    }
    let mut affected = 0;
    for mut entry in store.all().await? {
        if entry.pinned {
            continue;
        }
        entry.working_strength *= factor;
        entry.core_strength *= factor;
        store.update(&entry).await?;
        affected += 1;
    }
    Ok(affected)
}
