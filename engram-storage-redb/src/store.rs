//! [`engram_core::store::StorageBackend`] implementation over redb.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{ReadableTable, ReadableTableMetadata};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use engram_core::error::Error;
use engram_core::store::StorageBackend;
use engram_core::types::{AccessLogRow, GraphLink, HebbianLink, MemoryEntry};
use engram_core::Result;

use crate::tables::{
    ACCESS_LOG_TABLE, HEBBIAN_LINKS_TABLE, LARGE_PAYLOAD_WARNING_BYTES,
    MEMORIES_FOR_NODE_TABLE, MEMORIES_TABLE, NODES_FOR_MEMORY_TABLE,
};
use crate::RedbStore;

fn storage_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::StorageFailure(format!("{context}: {e}"))
}

fn join_err(e: tokio::task::JoinError) -> Error {
    Error::StorageFailure(format!("blocking task panicked: {e}"))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| storage_err("serialization failed", e))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| storage_err("deserialization failed", e))
}

#[async_trait]
impl StorageBackend for RedbStore {
    async fn insert(&self, entry: &MemoryEntry) -> Result<()> {
        self.update(entry).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryEntry>> {
        let db = Arc::clone(&self.db);
        let key = id.to_string();
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(|e| storage_err("begin_read", e))?;
            let table = read_txn
                .open_table(MEMORIES_TABLE)
                .map_err(|e| storage_err("open_table(memories)", e))?;
            match table.get(key.as_str()).map_err(|e| storage_err("get(memories)", e))? {
                Some(guard) => Ok(Some(decode(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(join_err)?
    }

    async fn update(&self, entry: &MemoryEntry) -> Result<()> {
        let bytes = encode(entry)?;
        if bytes.len() > LARGE_PAYLOAD_WARNING_BYTES {
            warn!(
                memory_id = %entry.id,
                bytes = bytes.len(),
                "large memory payload"
            );
        }
        let db = Arc::clone(&self.db);
        let key = entry.id.to_string();
        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(|e| storage_err("begin_write", e))?;
            {
                let mut table = write_txn
                    .open_table(MEMORIES_TABLE)
                    .map_err(|e| storage_err("open_table(memories)", e))?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| storage_err("insert(memories)", e))?;
            }
            write_txn.commit().map_err(|e| storage_err("commit", e))?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = id.to_string();
        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(|e| storage_err("begin_write", e))?;
            let removed = {
                let mut memories = write_txn
                    .open_table(MEMORIES_TABLE)
                    .map_err(|e| storage_err("open_table(memories)", e))?;
                let removed = memories
                    .remove(key.as_str())
                    .map_err(|e| storage_err("remove(memories)", e))?
                    .is_some();

                let mut access_log = write_txn
                    .open_table(ACCESS_LOG_TABLE)
                    .map_err(|e| storage_err("open_table(access_log)", e))?;
                access_log
                    .remove(key.as_str())
                    .map_err(|e| storage_err("remove(access_log)", e))?;

                let mut nodes_for_memory = write_txn
                    .open_table(NODES_FOR_MEMORY_TABLE)
                    .map_err(|e| storage_err("open_table(nodes_for_memory)", e))?;
                nodes_for_memory
                    .remove(key.as_str())
                    .map_err(|e| storage_err("remove(nodes_for_memory)", e))?;

                let mut hebbian = write_txn
                    .open_table(HEBBIAN_LINKS_TABLE)
                    .map_err(|e| storage_err("open_table(hebbian_links)", e))?;
                hebbian
                    .remove(key.as_str())
                    .map_err(|e| storage_err("remove(hebbian_links)", e))?;

                removed
            };
            write_txn.commit().map_err(|e| storage_err("commit", e))?;
            if !removed {
                return Err(Error::NotFound(id));
            }
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn all(&self) -> Result<Vec<MemoryEntry>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(|e| storage_err("begin_read", e))?;
            let table = read_txn
                .open_table(MEMORIES_TABLE)
                .map_err(|e| storage_err("open_table(memories)", e))?;
            let mut entries = Vec::with_capacity(table.len().unwrap_or(0) as usize);
            for row in table.iter().map_err(|e| storage_err("iter(memories)", e))? {
                let (_, value) = row.map_err(|e| storage_err("iter row", e))?;
                entries.push(decode(value.value())?);
            }
            Ok(entries)
        })
        .await
        .map_err(join_err)?
    }

    async fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<Uuid>> {
        debug!(query, limit, "redb backend full table scan for search_fts");
        let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let matches: Vec<Uuid> = self
            .all()
            .await?
            .into_iter()
            .filter(|entry| {
                let content = entry.content.to_lowercase();
                tokens.iter().any(|token| content.contains(token.as_str()))
            })
            .map(|entry| entry.id)
            .take(limit)
            .collect();
        Ok(matches)
    }

    async fn record_access(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = id.to_string();
        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(|e| storage_err("begin_write", e))?;
            {
                let mut table = write_txn
                    .open_table(ACCESS_LOG_TABLE)
                    .map_err(|e| storage_err("open_table(access_log)", e))?;
                let mut times: Vec<DateTime<Utc>> = match table
                    .get(key.as_str())
                    .map_err(|e| storage_err("get(access_log)", e))?
                {
                    Some(guard) => decode(guard.value())?,
                    None => Vec::new(),
                };
                times.push(at);
                let bytes = encode(&times)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| storage_err("insert(access_log)", e))?;
            }
            write_txn.commit().map_err(|e| storage_err("commit", e))?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn get_access_times(&self, id: Uuid) -> Result<Vec<DateTime<Utc>>> {
        let db = Arc::clone(&self.db);
        let key = id.to_string();
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(|e| storage_err("begin_read", e))?;
            let table = read_txn
                .open_table(ACCESS_LOG_TABLE)
                .map_err(|e| storage_err("open_table(access_log)", e))?;
            match table.get(key.as_str()).map_err(|e| storage_err("get(access_log)", e))? {
                Some(guard) => decode(guard.value()),
                None => Ok(Vec::new()),
            }
        })
        .await
        .map_err(join_err)?
    }

    async fn all_access_log(&self) -> Result<Vec<AccessLogRow>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(|e| storage_err("begin_read", e))?;
            let table = read_txn
                .open_table(ACCESS_LOG_TABLE)
                .map_err(|e| storage_err("open_table(access_log)", e))?;
            let mut rows = Vec::new();
            for row in table.iter().map_err(|e| storage_err("iter(access_log)", e))? {
                let (key, value) = row.map_err(|e| storage_err("iter row", e))?;
                let memory_id: Uuid = key
                    .value()
                    .parse()
                    .map_err(|e| storage_err("parse memory id", e))?;
                let times: Vec<DateTime<Utc>> = decode(value.value())?;
                rows.extend(times.into_iter().map(|accessed_at| AccessLogRow {
                    memory_id,
                    accessed_at,
                }));
            }
            Ok(rows)
        })
        .await
        .map_err(join_err)?
    }

    async fn add_graph_link(&self, link: &GraphLink) -> Result<()> {
        let db = Arc::clone(&self.db);
        let link = link.clone();
        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(|e| storage_err("begin_write", e))?;
            {
                let mut nodes_for_memory = write_txn
                    .open_table(NODES_FOR_MEMORY_TABLE)
                    .map_err(|e| storage_err("open_table(nodes_for_memory)", e))?;
                let memory_key = link.memory_id.to_string();
                let mut links: Vec<GraphLink> = match nodes_for_memory
                    .get(memory_key.as_str())
                    .map_err(|e| storage_err("get(nodes_for_memory)", e))?
                {
                    Some(guard) => decode(guard.value())?,
                    None => Vec::new(),
                };
                links.push(link.clone());
                let bytes = encode(&links)?;
                nodes_for_memory
                    .insert(memory_key.as_str(), bytes.as_slice())
                    .map_err(|e| storage_err("insert(nodes_for_memory)", e))?;
            }
            {
                let mut memories_for_node = write_txn
                    .open_table(MEMORIES_FOR_NODE_TABLE)
                    .map_err(|e| storage_err("open_table(memories_for_node)", e))?;
                let mut ids: Vec<Uuid> = match memories_for_node
                    .get(link.node_id.as_str())
                    .map_err(|e| storage_err("get(memories_for_node)", e))?
                {
                    Some(guard) => decode(guard.value())?,
                    None => Vec::new(),
                };
                ids.push(link.memory_id);
                let bytes = encode(&ids)?;
                memories_for_node
                    .insert(link.node_id.as_str(), bytes.as_slice())
                    .map_err(|e| storage_err("insert(memories_for_node)", e))?;
            }
            write_txn.commit().map_err(|e| storage_err("commit", e))?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn memories_for_node(&self, node_id: &str) -> Result<Vec<Uuid>> {
        let db = Arc::clone(&self.db);
        let node_id = node_id.to_string();
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(|e| storage_err("begin_read", e))?;
            let table = read_txn
                .open_table(MEMORIES_FOR_NODE_TABLE)
                .map_err(|e| storage_err("open_table(memories_for_node)", e))?;
            match table
                .get(node_id.as_str())
                .map_err(|e| storage_err("get(memories_for_node)", e))?
            {
                Some(guard) => decode(guard.value()),
                None => Ok(Vec::new()),
            }
        })
        .await
        .map_err(join_err)?
    }

    async fn nodes_for_memory(&self, memory_id: Uuid) -> Result<Vec<GraphLink>> {
        let db = Arc::clone(&self.db);
        let key = memory_id.to_string();
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(|e| storage_err("begin_read", e))?;
            let table = read_txn
                .open_table(NODES_FOR_MEMORY_TABLE)
                .map_err(|e| storage_err("open_table(nodes_for_memory)", e))?;
            match table.get(key.as_str()).map_err(|e| storage_err("get(nodes_for_memory)", e))? {
                Some(guard) => decode(guard.value()),
                None => Ok(Vec::new()),
            }
        })
        .await
        .map_err(join_err)?
    }

    async fn upsert_hebbian_link(&self, link: &HebbianLink) -> Result<()> {
        let db = Arc::clone(&self.db);
        let link = *link;
        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(|e| storage_err("begin_write", e))?;
            {
                let mut table = write_txn
                    .open_table(HEBBIAN_LINKS_TABLE)
                    .map_err(|e| storage_err("open_table(hebbian_links)", e))?;
                let key = link.source_id.to_string();
                let mut links: Vec<HebbianLink> = match table
                    .get(key.as_str())
                    .map_err(|e| storage_err("get(hebbian_links)", e))?
                {
                    Some(guard) => decode(guard.value())?,
                    None => Vec::new(),
                };
                match links.iter_mut().find(|existing| existing.target_id == link.target_id) {
                    Some(existing) => *existing = link,
                    None => links.push(link),
                }
                let bytes = encode(&links)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| storage_err("insert(hebbian_links)", e))?;
            }
            write_txn.commit().map_err(|e| storage_err("commit", e))?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn hebbian_neighbors(&self, id: Uuid) -> Result<Vec<HebbianLink>> {
        let db = Arc::clone(&self.db);
        let key = id.to_string();
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(|e| storage_err("begin_read", e))?;
            let table = read_txn
                .open_table(HEBBIAN_LINKS_TABLE)
                .map_err(|e| storage_err("open_table(hebbian_links)", e))?;
            match table.get(key.as_str()).map_err(|e| storage_err("get(hebbian_links)", e))? {
                Some(guard) => decode(guard.value()),
                None => Ok(Vec::new()),
            }
        })
        .await
        .map_err(join_err)?
    }

    async fn downscale_all_links(&self, factor: f64) -> Result<()> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(|e| storage_err("begin_write", e))?;
            {
                let mut table = write_txn
                    .open_table(HEBBIAN_LINKS_TABLE)
                    .map_err(|e| storage_err("open_table(hebbian_links)", e))?;
                let keys: Vec<String> = table
                    .iter()
                    .map_err(|e| storage_err("iter(hebbian_links)", e))?
                    .map(|row| row.map(|(k, _)| k.value().to_string()))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| storage_err("iter row", e))?;

                for key in keys {
                    let mut links: Vec<HebbianLink> = match table
                        .get(key.as_str())
                        .map_err(|e| storage_err("get(hebbian_links)", e))?
                    {
                        Some(guard) => decode(guard.value())?,
                        None => continue,
                    };
                    for link in &mut links {
                        link.strength *= factor;
                    }
                    let bytes = encode(&links)?;
                    table
                        .insert(key.as_str(), bytes.as_slice())
                        .map_err(|e| storage_err("insert(hebbian_links)", e))?;
                }
            }
            write_txn.commit().map_err(|e| storage_err("commit", e))?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn export(&self) -> Result<Vec<u8>> {
        let entries = self.all().await?;
        serde_json::to_vec(&entries).map_err(Error::from)
    }
}
