//! Hebbian association: co-activation strengthens links between memories,
//! and the entity graph lets retrieval traverse through shared entities
//! even when the memories never co-activated directly.

use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

use crate::store::StorageBackend;
use crate::types::{EngramConfig, HebbianLink};
use crate::Result;

/// Strengthen the Hebbian edge between every pair in `ids` (e.g. memories
/// jointly returned by one `recall`).
///
/// Edges are stored directed in both directions with equal strength.
/// Strengthening is linear: each co-activation adds `1.0` to `strength`,
/// capped at `config.hebbian.strength_ceiling`. A pair that has never
/// linked starts at `1.0`.
///
/// # Errors
///
/// Returns an error if the backend read or write fails.
pub async fn strengthen_coactivated(
    store: &dyn StorageBackend,
    config: &EngramConfig,
    ids: &[Uuid],
) -> Result<()> {
    let now = Utc::now();
    let ceiling = config.hebbian.strength_ceiling;
    for i in 0..ids.len() {
        for j in 0..ids.len() {
            if i == j {
                continue;
            }
            let (source_id, target_id) = (ids[i], ids[j]);
            let existing = store
                .hebbian_neighbors(source_id)
                .await?
                .into_iter()
                .find(|link| link.target_id == target_id);

            let (strength, coactivation_count, created_at) = match existing {
                Some(link) => (
                    (link.strength + 1.0).min(ceiling),
                    link.coactivation_count + 1,
                    link.created_at,
                ),
                None => (1.0_f64.min(ceiling), 1, now),
            };

            store
                .upsert_hebbian_link(&HebbianLink {
                    source_id,
                    target_id,
                    strength,
                    coactivation_count,
                    created_at,
                })
                .await?;
        }
    }
    Ok(())
}

/// Direct Hebbian neighbors of a memory, strongest first, optionally
/// capped to the top `k`.
///
/// # Errors
///
/// Returns an error if the backend read fails.
pub async fn neighbors(
    store: &dyn StorageBackend,
    id: Uuid,
    k: Option<usize>,
) -> Result<Vec<HebbianLink>> {
    let mut links = store.hebbian_neighbors(id).await?;
    links.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap_or(std::cmp::Ordering::Equal));
    if let Some(k) = k {
        links.truncate(k);
    }
    Ok(links)
}

/// Breadth-first traversal of the bipartite entity/memory graph, starting
/// from the entities occurring in `seed_memory`, up to `max_hops` hops and
/// returning at most `max_results` distinct memory ids (excluding the seed).
///
/// Used to widen recall through shared entities (e.g. "Alice" appears in
/// both a meeting note and an unrelated-by-text decision memo).
///
/// # Errors
///
/// Returns an error if the backend read fails.
pub async fn entity_graph_neighbors(
    store: &dyn StorageBackend,
    seed_memory: Uuid,
    max_hops: usize,
    max_results: usize,
) -> Result<Vec<Uuid>> {
    let mut visited_memories: HashSet<Uuid> = HashSet::from([seed_memory]);
    let mut visited_nodes: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<(Uuid, usize)> = VecDeque::from([(seed_memory, 0)]);
    let mut found = Vec::new();

    while let Some((memory_id, depth)) = frontier.pop_front() {
        if depth >= max_hops || found.len() >= max_results {
            continue;
        }
        for link in store.nodes_for_memory(memory_id).await? {
            if !visited_nodes.insert(link.node_id.clone()) {
                continue;
            }
            for neighbor_memory in store.memories_for_node(&link.node_id).await? {
                if visited_memories.insert(neighbor_memory) {
                    found.push(neighbor_memory);
                    frontier.push_back((neighbor_memory, depth + 1));
                    if found.len() >= max_results {
                        break;
                    }
                }
            }
        }
    }

    Ok(found)
}

/// Breadth-first traversal of the bipartite entity/memory graph starting
/// directly from host-supplied entity identifiers (e.g. context keywords
/// passed to `recall`), rather than from a seed memory's own entities.
///
/// Used by `graph_expand` to widen a recall's candidate set beyond
/// full-text and Hebbian matches.
///
/// # Errors
///
/// Returns an error if the backend read fails.
pub async fn entities_to_memories(
    store: &dyn StorageBackend,
    entities: &[String],
    max_hops: usize,
    max_results: usize,
) -> Result<Vec<Uuid>> {
    let mut visited_memories: HashSet<Uuid> = HashSet::new();
    let mut visited_nodes: HashSet<String> = entities.iter().cloned().collect();
    let mut frontier: VecDeque<(Uuid, usize)> = VecDeque::new();
    let mut found = Vec::new();

    for entity in entities {
        for memory_id in store.memories_for_node(entity).await? {
            if visited_memories.insert(memory_id) {
                found.push(memory_id);
                frontier.push_back((memory_id, 1));
                if found.len() >= max_results {
                    return Ok(found);
                }
            }
        }
    }

    while let Some((memory_id, depth)) = frontier.pop_front() {
        if depth >= max_hops || found.len() >= max_results {
            continue;
        }
        for link in store.nodes_for_memory(memory_id).await? {
            if !visited_nodes.insert(link.node_id.clone()) {
                continue;
            }
            for neighbor_memory in store.memories_for_node(&link.node_id).await? {
                if visited_memories.insert(neighbor_memory) {
                    found.push(neighbor_memory);
                    frontier.push_back((neighbor_memory, depth + 1));
                    if found.len() >= max_results {
                        break;
                    }
                }
            }
        }
    }

    Ok(found)
}

/// Apply a one-time multiplicative decay to every Hebbian link in the
/// store. Distinct from [`crate::consolidation::synaptic_downscale`], which
/// decays memory strengths, not link strengths; a host may call this on its
/// own schedule to keep the association graph from accumulating stale
/// strong edges.
///
/// # Errors
///
/// Returns an error if the backend write fails.
pub async fn downscale_links(
    store: &dyn StorageBackend,
    config: &EngramConfig,
) -> Result<()> {
    store
        .downscale_all_links(config.consolidation.downscaling_factor)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::GraphLink;

    #[tokio::test]
    async fn strengthen_creates_symmetric_links_starting_at_one() {
        let store = InMemoryStore::new();
        let config = EngramConfig::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        strengthen_coactivated(&store, &config, &[a, b]).await.unwrap();

        let a_to_b = neighbors(&store, a, None).await.unwrap();
        let b_to_a = neighbors(&store, b, None).await.unwrap();
        assert!((a_to_b[0].strength - 1.0).abs() < 1e-9);
        assert!((b_to_a[0].strength - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn repeated_coactivation_saturates_at_ceiling() {
        let store = InMemoryStore::new();
        let config = EngramConfig::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for _ in 0..50 {
            strengthen_coactivated(&store, &config, &[a, b]).await.unwrap();
        }
        let links = neighbors(&store, a, None).await.unwrap();
        assert!((links[0].strength - config.hebbian.strength_ceiling).abs() < 1e-9);
    }

    #[tokio::test]
    async fn neighbors_respects_k_limit() {
        let store = InMemoryStore::new();
        let config = EngramConfig::default();
        let a = Uuid::new_v4();
        for _ in 0..5 {
            strengthen_coactivated(&store, &config, &[a, Uuid::new_v4()]).await.unwrap();
        }
        let limited = neighbors(&store, a, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn entity_graph_neighbors_finds_memories_sharing_an_entity() {
        let store = InMemoryStore::new();
        let seed = Uuid::new_v4();
        let sibling = Uuid::new_v4();

        store
            .add_graph_link(&GraphLink {
                memory_id: seed,
                node_id: "alice".to_string(),
                relation: "mentions".to_string(),
            })
            .await
            .unwrap();
        store
            .add_graph_link(&GraphLink {
                memory_id: sibling,
                node_id: "alice".to_string(),
                relation: "mentions".to_string(),
            })
            .await
            .unwrap();

        let found = entity_graph_neighbors(&store, seed, 2, 10).await.unwrap();
        assert_eq!(found, vec![sibling]);
    }

    #[tokio::test]
    async fn entity_graph_neighbors_respects_max_results() {
        let store = InMemoryStore::new();
        let seed = Uuid::new_v4();
        store
            .add_graph_link(&GraphLink {
                memory_id: seed,
                node_id: "shared".to_string(),
                relation: "mentions".to_string(),
            })
            .await
            .unwrap();
        for _ in 0..5 {
            let other = Uuid::new_v4();
            store
                .add_graph_link(&GraphLink {
                    memory_id: other,
                    node_id: "shared".to_string(),
                    relation: "mentions".to_string(),
                })
                .await
                .unwrap();
        }

        let found = entity_graph_neighbors(&store, seed, 2, 2).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn entities_to_memories_finds_direct_hits() {
        let store = InMemoryStore::new();
        let memory = Uuid::new_v4();
        store
            .add_graph_link(&GraphLink {
                memory_id: memory,
                node_id: "apollo".to_string(),
                relation: "mentions".to_string(),
            })
            .await
            .unwrap();

        let found = entities_to_memories(&store, &["apollo".to_string()], 2, 10).await.unwrap();
        assert_eq!(found, vec![memory]);
    }
}
