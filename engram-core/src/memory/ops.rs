//! Public operations on [`Engram`].

use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use super::core::Engram;
use crate::activation::{self, RankedMemory, RecallOptions};
use crate::confidence;
use crate::consolidation::ConsolidationStats;
use crate::error::Error;
use crate::forgetting;
use crate::hebbian;
use crate::reward::{self, Polarity};
use crate::session;
use crate::types::{GraphLink, Layer, MemoryEntry, MemoryType};
use crate::Result;

/// A recalled memory paired with its confidence assessment.
#[derive(Debug, Clone)]
pub struct RecalledMemory {
    /// The ranked memory and its activation breakdown.
    pub ranked: RankedMemory,
    /// Combined confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Labeled confidence tier.
    pub confidence_label: confidence::ConfidenceLabel,
}

/// Aggregate counts over the current store, returned by [`Engram::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngramStats {
    /// Total memories across every layer.
    pub total: usize,
    /// Memories in `L2_core`.
    pub core: usize,
    /// Memories in `L3_working`.
    pub working: usize,
    /// Memories in `L4_archive`.
    pub archived: usize,
    /// Pinned memories, any layer.
    pub pinned: usize,
}

impl Engram {
    /// Validate and store a new memory, starting it in `L3_working`.
    ///
    /// If `contradicts` is given, the referenced memory must already
    /// exist; its `contradicted_by` is set to the new id, forming a
    /// bidirectional contradiction edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `content` is empty, `importance`
    /// is outside `[0, 1]`, or `contradicts` names an unknown id, or any
    /// error the backend raises.
    #[tracing::instrument(skip(self, content, context))]
    pub async fn add(
        &self,
        content: impl Into<String>,
        memory_type: MemoryType,
        importance: f64,
        context: HashMap<String, String>,
        pinned: bool,
        contradicts: Option<Uuid>,
    ) -> Result<Uuid> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::InvalidInput("content must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&importance) {
            return Err(Error::InvalidInput(format!(
                "importance must be in [0, 1], got {importance}"
            )));
        }

        let _guard = self.write_lock.write().await;
        if let Some(target_id) = contradicts {
            let Some(mut target) = self.store.get(target_id).await? else {
                return Err(Error::InvalidInput(format!(
                    "contradicts references unknown memory {target_id}"
                )));
            };
            let mut entry =
                MemoryEntry::new(content, memory_type, importance, context, pinned, Utc::now());
            entry.contradicts = Some(target_id);
            entry.access_count = 1;
            target.contradicted_by = Some(entry.id);
            self.store.insert(&entry).await?;
            self.store.update(&target).await?;
            self.store.record_access(entry.id, entry.created_at).await?;
            return Ok(entry.id);
        }

        let mut entry = MemoryEntry::new(content, memory_type, importance, context, pinned, Utc::now());
        entry.access_count = 1;
        self.store.insert(&entry).await?;
        self.store.record_access(entry.id, entry.created_at).await?;
        Ok(entry.id)
    }

    /// Mark `a` as contradicting `b`: sets `a.contradicts = Some(b)` and
    /// `b.contradicted_by = Some(a)`. The spec's `add(contradicts=x)` path
    /// only covers the contradiction edge at creation time; this is the
    /// explicit API for linking two already-existing memories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if either id does not exist.
    pub async fn link_contradiction(&self, a: Uuid, b: Uuid) -> Result<()> {
        let _guard = self.write_lock.write().await;
        let mut entry_a = self.store.get(a).await?.ok_or(Error::NotFound(a))?;
        let mut entry_b = self.store.get(b).await?.ok_or(Error::NotFound(b))?;
        entry_a.contradicts = Some(b);
        entry_b.contradicted_by = Some(a);
        self.store.update(&entry_a).await?;
        self.store.update(&entry_b).await?;
        Ok(())
    }

    /// Record that `node_id` occurs in `memory_id` with the given relation,
    /// building the entity graph used for Hebbian spreading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `memory_id` does not exist, or any
    /// error the backend raises.
    pub async fn tag_entity(&self, memory_id: Uuid, node_id: &str, relation: &str) -> Result<()> {
        if self.store.get(memory_id).await?.is_none() {
            return Err(Error::NotFound(memory_id));
        }
        self.store
            .add_graph_link(&GraphLink {
                memory_id,
                node_id: node_id.to_string(),
                relation: relation.to_string(),
            })
            .await
    }

    /// Fetch a memory by id without affecting its access history.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub async fn get(&self, id: Uuid) -> Result<Option<MemoryEntry>> {
        self.store.get(id).await
    }

    /// Rank and return the top `limit` memories matching `query`,
    /// recording an access for each and strengthening their mutual
    /// Hebbian links (co-retrieved memories co-activate).
    ///
    /// Archived memories are excluded unless `include_archived` is set.
    /// Sugar over [`Engram::recall_with_options`] with graph expansion and
    /// entity-hop spreading left at their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read or write fails.
    #[tracing::instrument(skip(self, query))]
    pub async fn recall(&self, query: &str, limit: usize, include_archived: bool) -> Result<Vec<RecalledMemory>> {
        self.recall_with_options(
            query,
            RecallOptions {
                limit,
                include_archive: include_archived,
                ..Default::default()
            },
        )
        .await
    }

    /// Rank and return memories matching `query` under the full
    /// [`RecallOptions`] surface (confidence floor, graph expansion,
    /// explicit context keywords, contradicted-memory inclusion),
    /// recording an access for each and strengthening their mutual
    /// Hebbian links (co-retrieved memories co-activate).
    ///
    /// Retrieval-induced forgetting suppresses same-type overlapping
    /// competitors of the top-ranked result only, unless
    /// [`crate::types::ForgettingConfig::suppress_all_results`] is set, in
    /// which case every result's competitors are suppressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read or write fails.
    #[tracing::instrument(skip(self, query, options))]
    pub async fn recall_with_options(
        &self,
        query: &str,
        options: RecallOptions,
    ) -> Result<Vec<RecalledMemory>> {
        let now = Utc::now();
        let ranked = activation::recall(self.store.as_ref(), &self.config, query, &options, now).await?;

        let ids: Vec<Uuid> = ranked.iter().map(|r| r.entry.id).collect();
        for r in &ranked {
            self.store.record_access(r.entry.id, now).await?;
            let mut updated = r.entry.clone();
            updated.access_count += 1;
            updated.last_accessed = now;
            self.store.update(&updated).await?;
        }
        if ids.len() > 1 {
            hebbian::strengthen_coactivated(self.store.as_ref(), &self.config, &ids).await?;
        }
        if self.config.forgetting.suppress_all_results {
            for r in &ranked {
                forgetting::suppress_competitors(self.store.as_ref(), &self.config, &r.entry).await?;
            }
        } else if let Some(top) = ranked.first() {
            forgetting::suppress_competitors(self.store.as_ref(), &self.config, &top.entry).await?;
        }

        let mut recalled = Vec::with_capacity(ranked.len());
        for r in ranked {
            let (score, label) = confidence::assess(&r.entry, &self.config, now);
            recalled.push(RecalledMemory {
                ranked: r,
                confidence: score,
                confidence_label: label,
            });
        }
        Ok(recalled)
    }

    /// Recall gated by a session's working-memory set. Runs a cheap probe
    /// against `query` to decide whether the session's current working set
    /// (expanded over its Hebbian neighbors) already covers the topic; if
    /// so, returns those active memories directly without a full
    /// activation-ranked recall. Otherwise falls back to
    /// [`Engram::recall`] and activates its results in the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read or write fails.
    pub async fn session_recall(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RecalledMemory>> {
        let now = Utc::now();
        let needs_full = {
            let mut sessions = self.sessions.write().await;
            let wm = sessions.session_mut(session_id);
            session::needs_recall(wm, self.store.as_ref(), &self.config, query, now).await?
        };

        if !needs_full {
            let active_ids = {
                let mut sessions = self.sessions.write().await;
                sessions.session_mut(session_id).active_ids()
            };
            let mut recalled = Vec::with_capacity(active_ids.len().min(limit));
            for id in active_ids.iter().take(limit) {
                if let Some(entry) = self.store.get(*id).await? {
                    let access_times = self.store.get_access_times(entry.id).await?;
                    let decay_exponent = self.config.activation.decay_exponent;
                    let base_level = crate::activation::base_level_activation(&access_times, now, decay_exponent);
                    let (score, label) = confidence::assess(&entry, &self.config, now);
                    recalled.push(RecalledMemory {
                        ranked: RankedMemory {
                            entry,
                            base_level,
                            spreading: 0.0,
                            activation: base_level,
                        },
                        confidence: score,
                        confidence_label: label,
                    });
                }
            }
            return Ok(recalled);
        }

        let recalled = self.recall(query, limit, false).await?;
        let mut sessions = self.sessions.write().await;
        let wm = sessions.session_mut(session_id);
        for r in &recalled {
            wm.activate(r.ranked.entry.id, now);
        }
        Ok(recalled)
    }

    /// Run one consolidation cycle over the store, stepping the transfer
    /// equations by `dt_days` (fractional days; `1.0` is one full cycle).
    ///
    /// # Errors
    ///
    /// Returns an error if a cycle is already running or the backend fails.
    pub async fn consolidate(&self, dt_days: f64, seed: u64) -> Result<ConsolidationStats> {
        let _guard = self.write_lock.write().await;
        self.consolidation
            .run_cycle(self.store.as_ref(), &self.config, Utc::now(), dt_days, seed)
            .await
    }

    /// Move every `L3_working` memory whose effective strength has fallen
    /// below `threshold` (or
    /// [`crate::types::ForgettingConfig::prune_threshold`] if `None`) into
    /// `L4_archive`. Archived memories are never deleted by this operation
    /// — see [`Engram::forget`] for the destructive counterpart. Returns
    /// the ids newly archived.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read or write fails.
    pub async fn prune(&self, threshold: Option<f64>) -> Result<Vec<Uuid>> {
        let _guard = self.write_lock.write().await;
        let now = Utc::now();
        let mut config = self.config.clone();
        if let Some(threshold) = threshold {
            config.forgetting.prune_threshold = threshold;
        }
        forgetting::prune(self.store.as_ref(), &config, now).await
    }

    /// Permanently delete a memory, nulling any `contradicts` /
    /// `contradicted_by` cross-references that pointed at it on other
    /// entries. This bypasses pinning — pin only exempts a memory from
    /// forgetting and consolidation, not from an explicit delete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the memory does not exist.
    pub async fn forget(&self, id: Uuid) -> Result<()> {
        let _guard = self.write_lock.write().await;
        forgetting::forget(self.store.as_ref(), id).await
    }

    /// Alias for [`Engram::forget`]: permanently delete a memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the memory does not exist.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.forget(id).await
    }

    /// Apply a reward event based on detected feedback polarity in
    /// `feedback_text`, against the `recent_n` memories with the greatest
    /// `last_accessed` across the whole store.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read or write fails.
    pub async fn reward(&self, feedback_text: &str) -> Result<Vec<Uuid>> {
        let _guard = self.write_lock.write().await;
        reward::apply_reward(self.store.as_ref(), &self.config, feedback_text).await
    }

    /// Classify feedback polarity without applying a reward, useful for
    /// hosts that want to log or gate on the signal themselves.
    #[must_use]
    pub fn classify_feedback(&self, feedback_text: &str) -> (Polarity, f64) {
        reward::detect_feedback(feedback_text)
    }

    /// Mark a memory as pinned, exempting it from decay, suppression, and
    /// pruning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the memory does not exist.
    pub async fn pin(&self, id: Uuid) -> Result<()> {
        self.set_pinned(id, true).await
    }

    /// Clear a memory's pinned flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the memory does not exist.
    pub async fn unpin(&self, id: Uuid) -> Result<()> {
        self.set_pinned(id, false).await
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool) -> Result<()> {
        let _guard = self.write_lock.write().await;
        let mut entry = self.store.get(id).await?.ok_or(Error::NotFound(id))?;
        entry.pinned = pinned;
        self.store.update(&entry).await
    }

    /// Aggregate counts over the current store.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub async fn stats(&self) -> Result<EngramStats> {
        let all = self.store.all().await?;
        let mut stats = EngramStats::default();
        for entry in &all {
            stats.total += 1;
            match entry.layer {
                Layer::L2Core => stats.core += 1,
                Layer::L3Working => stats.working += 1,
                Layer::L4Archive => stats.archived += 1,
            }
            if entry.pinned {
                stats.pinned += 1;
            }
        }
        Ok(stats)
    }

    /// Record a host-defined metric sample and report whether it is
    /// anomalous relative to its rolling baseline.
    pub async fn record_metric(&self, name: &str, value: f64) -> bool {
        let mut tracker = self.anomalies.write().await;
        let is_anomaly = tracker.is_anomaly(name, value);
        tracker.record(name, value);
        is_anomaly
    }

    /// Drop all session working-memory state for `session_id`.
    pub async fn clear_session(&self, session_id: &str) {
        self.sessions.write().await.clear_session(session_id);
    }

    /// Serialize the entire store to a portable JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend export fails.
    pub async fn export(&self) -> Result<Vec<u8>> {
        self.store.export().await
    }

    /// Flush and release the underlying storage backend. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to flush.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}
