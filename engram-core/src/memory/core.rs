//! `Engram` struct definition and construction.

use std::sync::Arc;
use tokio::sync::RwLock as AsyncRwLock;

use crate::consolidation::ConsolidationEngine;
use crate::session::SessionRegistry;
use crate::store::StorageBackend;
use crate::types::EngramConfig;

/// The embeddable memory-dynamics engine.
///
/// Wraps a [`StorageBackend`] with the activation, consolidation,
/// forgetting, Hebbian, confidence, reward, anomaly, and session modules
/// and exposes them as a small, host-facing API (see the methods in
/// [`super::ops`]).
///
/// Reads (`recall`, `get`) take a shared lock so many can run
/// concurrently; writes (`add`, `consolidate`, `forget`, `reward`) take an
/// exclusive lock, so at most one write is ever in flight against the
/// store's consolidation/decay state at a time.
pub struct Engram {
    pub(super) store: Arc<dyn StorageBackend>,
    pub(super) config: EngramConfig,
    pub(super) consolidation: ConsolidationEngine,
    pub(super) sessions: AsyncRwLock<SessionRegistry>,
    pub(super) anomalies: AsyncRwLock<crate::anomaly::AnomalyTracker>,
    pub(super) write_lock: AsyncRwLock<()>,
}

impl Engram {
    /// Build an engine over `store` with a default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(store, EngramConfig::default())
    }

    /// Build an engine over `store` with an explicit configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn StorageBackend>, config: EngramConfig) -> Self {
        let sessions = SessionRegistry::new(config.session);
        Self {
            store,
            config,
            consolidation: ConsolidationEngine::new(),
            sessions: AsyncRwLock::new(sessions),
            anomalies: AsyncRwLock::new(crate::anomaly::AnomalyTracker::new()),
            write_lock: AsyncRwLock::new(()),
        }
    }

    /// The engine's active configuration.
    #[must_use]
    pub fn config(&self) -> &EngramConfig {
        &self.config
    }
}
