//! Table definitions for the redb-backed store.
//!
//! Every table maps a string key to a postcard-encoded blob. Collections
//! (access history, graph links, Hebbian neighbors) are stored as a single
//! encoded `Vec<T>` per key rather than one row per item, since redb has no
//! secondary indexes and this keeps every lookup a single point read.

use redb::TableDefinition;

/// `memory id -> postcard(MemoryEntry)`
pub(crate) const MEMORIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("memories");

/// `memory id -> postcard(Vec<DateTime<Utc>>)`
pub(crate) const ACCESS_LOG_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("access_log");

/// `memory id -> postcard(Vec<GraphLink>)`, the entities occurring in a memory.
pub(crate) const NODES_FOR_MEMORY_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("nodes_for_memory");

/// `node id -> postcard(Vec<Uuid>)`, the memories an entity occurs in.
pub(crate) const MEMORIES_FOR_NODE_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("memories_for_node");

/// `source memory id -> postcard(Vec<HebbianLink>)`, outgoing edges.
pub(crate) const HEBBIAN_LINKS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("hebbian_links");

/// Payload size, in bytes, above which a write logs a warning. Large
/// memory content is allowed but worth flagging — it usually means a host
/// is storing something that should be chunked upstream.
pub(crate) const LARGE_PAYLOAD_WARNING_BYTES: usize = 100_000;
