use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::StorageBackend;
use crate::error::Error;
use crate::types::{AccessLogRow, GraphLink, HebbianLink, MemoryEntry};
use crate::Result;

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, MemoryEntry>,
    access_log: Vec<AccessLogRow>,
    graph_links: Vec<GraphLink>,
    hebbian_links: HashMap<(Uuid, Uuid), HebbianLink>,
}

/// An in-process, non-durable [`StorageBackend`].
///
/// Used by this crate's own unit tests and by hosts that accept losing
/// memory state on process exit. `engram-storage-redb` is the durable
/// counterpart.
///
/// # Examples
///
/// ```
/// use engram_core::store::{InMemoryStore, StorageBackend};
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = InMemoryStore::new();
/// assert!(store.all().await.unwrap().is_empty());
/// # }
/// ```
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStore {
    async fn insert(&self, entry: &MemoryEntry) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.entries.contains_key(&entry.id) {
            return Err(Error::StorageFailure(format!(
                "memory {} already exists",
                entry.id
            )));
        }
        inner.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryEntry>> {
        Ok(self.inner.read().entries.get(&id).cloned())
    }

    async fn update(&self, entry: &MemoryEntry) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(&entry.id) {
            return Err(Error::NotFound(entry.id));
        }
        inner.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.entries.remove(&id).is_none() {
            return Err(Error::NotFound(id));
        }
        inner.access_log.retain(|row| row.memory_id != id);
        inner.graph_links.retain(|link| link.memory_id != id);
        inner
            .hebbian_links
            .retain(|(src, dst), _| *src != id && *dst != id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<MemoryEntry>> {
        Ok(self.inner.read().entries.values().cloned().collect())
    }

    async fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<Uuid>> {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let inner = self.inner.read();
        let mut hits: Vec<Uuid> = inner
            .entries
            .values()
            .filter(|entry| {
                let content = entry.content.to_lowercase();
                tokens.iter().any(|token| content.contains(token.as_str()))
            })
            .map(|entry| entry.id)
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn record_access(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.inner.write().access_log.push(AccessLogRow {
            memory_id: id,
            accessed_at: at,
        });
        Ok(())
    }

    async fn get_access_times(&self, id: Uuid) -> Result<Vec<DateTime<Utc>>> {
        Ok(self
            .inner
            .read()
            .access_log
            .iter()
            .filter(|row| row.memory_id == id)
            .map(|row| row.accessed_at)
            .collect())
    }

    async fn add_graph_link(&self, link: &GraphLink) -> Result<()> {
        self.inner.write().graph_links.push(link.clone());
        Ok(())
    }

    async fn memories_for_node(&self, node_id: &str) -> Result<Vec<Uuid>> {
        Ok(self
            .inner
            .read()
            .graph_links
            .iter()
            .filter(|link| link.node_id == node_id)
            .map(|link| link.memory_id)
            .collect())
    }

    async fn nodes_for_memory(&self, memory_id: Uuid) -> Result<Vec<GraphLink>> {
        Ok(self
            .inner
            .read()
            .graph_links
            .iter()
            .filter(|link| link.memory_id == memory_id)
            .cloned()
            .collect())
    }

    async fn upsert_hebbian_link(&self, link: &HebbianLink) -> Result<()> {
        self.inner
            .write()
            .hebbian_links
            .insert((link.source_id, link.target_id), *link);
        Ok(())
    }

    async fn hebbian_neighbors(&self, id: Uuid) -> Result<Vec<HebbianLink>> {
        Ok(self
            .inner
            .read()
            .hebbian_links
            .values()
            .filter(|link| link.source_id == id)
            .copied()
            .collect())
    }

    async fn downscale_all_links(&self, factor: f64) -> Result<()> {
        for link in self.inner.write().hebbian_links.values_mut() {
            link.strength *= factor;
        }
        Ok(())
    }

    async fn all_access_log(&self) -> Result<Vec<AccessLogRow>> {
        Ok(self.inner.read().access_log.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn export(&self) -> Result<Vec<u8>> {
        let inner = self.inner.read();
        let entries: Vec<&MemoryEntry> = inner.entries.values().collect();
        serde_json::to_vec(&entries).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryType;
    use std::collections::HashMap as StdHashMap;

    fn sample_entry() -> MemoryEntry {
        MemoryEntry::new(
            "the deploy key rotates every 90 days".to_string(),
            MemoryType::Factual,
            0.7,
            StdHashMap::new(),
            false,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = InMemoryStore::new();
        let entry = sample_entry();
        store.insert(&entry).await.unwrap();
        let fetched = store.get(entry.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, entry.content);
    }

    #[tokio::test]
    async fn duplicate_insert_fails() {
        let store = InMemoryStore::new();
        let entry = sample_entry();
        store.insert(&entry).await.unwrap();
        assert!(store.insert(&entry).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_entry_and_derived_rows() {
        let store = InMemoryStore::new();
        let entry = sample_entry();
        store.insert(&entry).await.unwrap();
        store.record_access(entry.id, Utc::now()).await.unwrap();
        store
            .add_graph_link(&GraphLink {
                memory_id: entry.id,
                node_id: "deploy-key".to_string(),
                relation: "mentions".to_string(),
            })
            .await
            .unwrap();

        store.delete(entry.id).await.unwrap();

        assert!(store.get(entry.id).await.unwrap().is_none());
        assert!(store.get_access_times(entry.id).await.unwrap().is_empty());
        assert!(store.nodes_for_memory(entry.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_fts_is_case_insensitive_substring_match() {
        let store = InMemoryStore::new();
        let entry = sample_entry();
        store.insert(&entry).await.unwrap();
        let hits = store.search_fts("DEPLOY KEY", 10).await.unwrap();
        assert_eq!(hits, vec![entry.id]);
    }

    #[tokio::test]
    async fn search_fts_matches_any_token_not_the_whole_phrase() {
        let store = InMemoryStore::new();
        let entry = sample_entry();
        store.insert(&entry).await.unwrap();
        // "rotation" never appears verbatim; "rotates" does, so the shared
        // token "key" (and only "key") must still produce a hit under OR
        // semantics even though the full phrase isn't a substring.
        let hits = store.search_fts("deploy key rotation", 10).await.unwrap();
        assert_eq!(hits, vec![entry.id]);
    }

    #[tokio::test]
    async fn downscale_all_links_scales_strength() {
        let store = InMemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store
            .upsert_hebbian_link(&HebbianLink {
                source_id: a,
                target_id: b,
                strength: 0.8,
                coactivation_count: 3,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store.downscale_all_links(0.5).await.unwrap();
        let neighbors = store.hebbian_neighbors(a).await.unwrap();
        assert!((neighbors[0].strength - 0.4).abs() < 1e-9);
    }
}
