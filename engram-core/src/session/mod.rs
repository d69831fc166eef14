//! Per-session working memory: a small, bounded set of recently active
//! memory ids, used to gate whether a short-horizon turn should bother
//! issuing a full activation-ranked recall at all.
//!
//! Capacity and recency are both hard cutoffs (Miller's 7±2 ids, a fixed
//! time window), not a multiplicative decay weight — an id is either
//! within the window and the most recent `capacity` entries, or it isn't
//! tracked at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::activation::{self, RecallOptions};
use crate::store::StorageBackend;
use crate::types::{EngramConfig, SessionConfig};
use crate::Result;

/// A single session's bounded, time-windowed set of active memory ids.
///
/// New ids enter with `activated_at = now`; re-activating an already
/// active id refreshes its timestamp. [`SessionWorkingMemory::prune`]
/// drops anything older than [`SessionConfig::decay_window_secs`]; when the
/// set exceeds [`SessionConfig::capacity`] the oldest-activated ids are
/// dropped first.
pub struct SessionWorkingMemory {
    config: SessionConfig,
    active: HashMap<Uuid, DateTime<Utc>>,
}

impl SessionWorkingMemory {
    /// A fresh, empty working-memory set for one session.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
        }
    }

    /// Mark `id` as active at `now`, then [`SessionWorkingMemory::prune`].
    pub fn activate(&mut self, id: Uuid, now: DateTime<Utc>) {
        self.active.insert(id, now);
        self.prune(now);
    }

    /// Drop ids older than the decay window, then drop the oldest-activated
    /// ids beyond capacity. Returns the ids evicted.
    pub fn prune(&mut self, now: DateTime<Utc>) -> Vec<Uuid> {
        let window = chrono::Duration::seconds(self.config.decay_window_secs);
        let mut evicted: Vec<Uuid> = self
            .active
            .iter()
            .filter(|(_, &activated_at)| now - activated_at > window)
            .map(|(id, _)| *id)
            .collect();
        for id in &evicted {
            self.active.remove(id);
        }

        if self.active.len() > self.config.capacity {
            let mut by_recency: Vec<(Uuid, DateTime<Utc>)> =
                self.active.iter().map(|(id, at)| (*id, *at)).collect();
            by_recency.sort_by(|a, b| b.1.cmp(&a.1));
            for (id, _) in by_recency.into_iter().skip(self.config.capacity) {
                self.active.remove(&id);
                evicted.push(id);
            }
        }
        evicted
    }

    /// Current active ids, most recently activated first.
    #[must_use]
    pub fn active_ids(&self) -> Vec<Uuid> {
        let mut by_recency: Vec<(Uuid, DateTime<Utc>)> =
            self.active.iter().map(|(id, at)| (*id, *at)).collect();
        by_recency.sort_by(|a, b| b.1.cmp(&a.1));
        by_recency.into_iter().map(|(id, _)| id).collect()
    }

    /// Whether `id` is currently tracked as active.
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.active.contains_key(&id)
    }

    /// Number of ids currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Decide whether a turn needs a full activation-ranked recall, or whether
/// the session's working memory is still "on topic" and can be trusted as
/// the candidate set.
///
/// Procedure: prune the set against `now`; an empty set always needs a
/// full recall. Otherwise compute the Hebbian neighbors of every active id,
/// run a cheap probe recall (`limit=3`, `graph_expand=false`) for
/// `probe_query`, and compare the probe's ids against `active ∪
/// neighbors`. If fewer than [`SessionConfig::overlap_threshold`] of the
/// probe's ids are already known to the session, the topic has likely
/// shifted and a full recall is warranted.
///
/// # Errors
///
/// Returns an error if the backend read fails.
pub async fn needs_recall(
    wm: &mut SessionWorkingMemory,
    store: &dyn StorageBackend,
    config: &EngramConfig,
    probe_query: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    wm.prune(now);
    if wm.is_empty() {
        return Ok(true);
    }

    let active = wm.active_ids();
    let mut known: std::collections::HashSet<Uuid> = active.iter().copied().collect();
    for id in &active {
        for link in store.hebbian_neighbors(*id).await? {
            known.insert(link.target_id);
        }
    }

    let probe_options = RecallOptions {
        limit: 3,
        graph_expand: false,
        ..Default::default()
    };
    let probe = activation::recall(store, config, probe_query, &probe_options, now).await?;
    if probe.is_empty() {
        return Ok(true);
    }

    let overlap = probe.iter().filter(|r| known.contains(&r.entry.id)).count() as f64 / probe.len() as f64;
    Ok(overlap < config.session.overlap_threshold)
}

/// Registry of per-session [`SessionWorkingMemory`] instances, keyed by a
/// host-assigned session identifier.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, SessionWorkingMemory>,
    config: SessionConfig,
}

impl SessionRegistry {
    /// A registry that creates new sessions with `config`.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// The session's working memory, creating it if it doesn't exist yet.
    pub fn session_mut(&mut self, session_id: &str) -> &mut SessionWorkingMemory {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionWorkingMemory::new(self.config))
    }

    /// Drop all working-memory state for a session.
    pub fn clear_session(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Every session id currently tracked, in no particular order.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }
}
