//! Storage abstraction.
//!
//! [`StorageBackend`] is the single seam between the memory-dynamics
//! algorithms in this crate and durable persistence. `engram-storage-redb`
//! provides the on-disk implementation; [`InMemoryStore`] here is a
//! reference implementation used by the crate's own tests and suitable for
//! hosts that don't need durability.

mod in_memory;

pub use in_memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{AccessLogRow, GraphLink, HebbianLink, MemoryEntry};
use crate::Result;

/// Unified storage backend trait for memory persistence.
///
/// Every method is async so both genuinely async backends and `spawn_blocking`-wrapped
/// synchronous backends (like redb) implement the same interface.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert a newly-created memory. Fails if `entry.id` already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    async fn insert(&self, entry: &MemoryEntry) -> Result<()>;

    /// Fetch a memory by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    async fn get(&self, id: Uuid) -> Result<Option<MemoryEntry>>;

    /// Overwrite an existing memory in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn update(&self, entry: &MemoryEntry) -> Result<()>;

    /// Remove a memory and its derived rows (access log, graph links,
    /// Hebbian links).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// List every memory currently in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    async fn all(&self) -> Result<Vec<MemoryEntry>>;

    /// Full-text search over memory content, backend-defined ranking.
    ///
    /// Returns at most `limit` candidate ids, most relevant first. The
    /// caller (`activation`) re-ranks these by the activation formula; this
    /// is a recall-oriented prefilter, not the final ordering.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    async fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<Uuid>>;

    /// Append one access-log row. Does not update `MemoryEntry.access_count`
    /// or `last_accessed`; callers update the denormalized cache themselves
    /// via [`StorageBackend::update`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn record_access(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// All recorded access timestamps for a memory, used by the
    /// base-level activation formula. Unspecified order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    async fn get_access_times(&self, id: Uuid) -> Result<Vec<DateTime<Utc>>>;

    /// Record that `node_id` occurs in `memory_id` with the given relation.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn add_graph_link(&self, link: &GraphLink) -> Result<()>;

    /// All memory ids that co-occur with `node_id` via a [`GraphLink`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    async fn memories_for_node(&self, node_id: &str) -> Result<Vec<Uuid>>;

    /// All graph nodes occurring in a memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    async fn nodes_for_memory(&self, memory_id: Uuid) -> Result<Vec<GraphLink>>;

    /// Insert or strengthen the Hebbian edge between two memories.
    ///
    /// If a link already exists in the given direction its `strength` and
    /// `coactivation_count` are overwritten with the provided values;
    /// otherwise a new link is created with `created_at` set to `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn upsert_hebbian_link(&self, link: &HebbianLink) -> Result<()>;

    /// Outgoing Hebbian links from a memory, used by spreading activation
    /// and neighbor lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    async fn hebbian_neighbors(&self, id: Uuid) -> Result<Vec<HebbianLink>>;

    /// Multiplicatively scale every Hebbian link's `strength` by `factor`,
    /// used by synaptic downscaling.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn downscale_all_links(&self, factor: f64) -> Result<()>;

    /// Append one access-log row with an explicit writer, used internally
    /// by backends that must batch; the default forwards to
    /// [`StorageBackend::record_access`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn all_access_log(&self) -> Result<Vec<AccessLogRow>>;

    /// Flush and release any resources held by the backend. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a pending write cannot be flushed.
    async fn close(&self) -> Result<()>;

    /// Serialize the entire store to a portable snapshot, used by
    /// `Engram::export`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend read fails.
    async fn export(&self) -> Result<Vec<u8>>;
}
