use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::enums::{Layer, MemoryType};

/// A single stored memory and its cognitive metadata.
///
/// See the data model specification for field semantics and invariants.
/// `working_strength`/`core_strength` are the dual traces consumed by
/// [`crate::consolidation`]; `access_count`/`last_accessed` are caches over
/// the authoritative [`AccessLogRow`] history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Opaque stable identifier, unique across the store.
    pub id: Uuid,
    /// The text payload. Required, non-empty.
    pub content: String,
    /// Cognitive category; drives default decay rate and reliability.
    pub memory_type: MemoryType,
    /// Coarse lifecycle layer.
    pub layer: Layer,
    /// Importance in `[0, 1]`. Drives consolidation rate and reward ceilings.
    pub importance: f64,
    /// Fast-decaying working trace.
    pub working_strength: f64,
    /// Slow-decaying core trace.
    pub core_strength: f64,
    /// Monotonically non-decreasing; cache over access-log row count.
    pub access_count: u64,
    /// Monotonically non-decreasing; incremented once per consolidation step.
    pub consolidation_count: u64,
    /// When this entry was created.
    pub created_at: DateTime<Utc>,
    /// Most recent access time (cache over the access log).
    pub last_accessed: DateTime<Utc>,
    /// Most recent consolidation-cycle step time.
    pub last_consolidated: DateTime<Utc>,
    /// If true, exempt from decay, archival, suppression, and downscaling.
    pub pinned: bool,
    /// If set, this memory contradicts the referenced memory.
    pub contradicts: Option<Uuid>,
    /// If set, the referenced memory contradicts this one.
    pub contradicted_by: Option<Uuid>,
    /// Host-supplied tags, opaque to the core.
    pub context: HashMap<String, String>,
}

impl MemoryEntry {
    /// Construct a freshly-created `L3_working` entry as `add` does.
    ///
    /// `working_strength` starts at `1.0`, `core_strength` at `0.0`, all
    /// counters at zero, and all three timestamps at `now`.
    #[must_use]
    pub fn new(
        content: String,
        memory_type: MemoryType,
        importance: f64,
        context: HashMap<String, String>,
        pinned: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            memory_type,
            layer: Layer::L3Working,
            importance,
            working_strength: 1.0,
            core_strength: 0.0,
            access_count: 0,
            consolidation_count: 0,
            created_at: now,
            last_accessed: now,
            last_consolidated: now,
            pinned,
            contradicts: None,
            contradicted_by: None,
            context,
        }
    }

    /// `working_strength + core_strength`, the raw (non-decayed) total.
    #[must_use]
    pub fn raw_strength(&self) -> f64 {
        self.working_strength + self.core_strength
    }
}

/// One row of the authoritative access-log history for a memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccessLogRow {
    /// The memory this access refers to.
    pub memory_id: Uuid,
    /// When the access occurred.
    pub accessed_at: DateTime<Utc>,
}

/// An entity-occurrence row written by the host at add-time.
///
/// `node_id` and `relation` are opaque strings the host assigns; the core
/// only traverses the bipartite entity/memory graph they form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLink {
    /// The memory the entity occurs in.
    pub memory_id: Uuid,
    /// Host-assigned entity identifier.
    pub node_id: String,
    /// Host-assigned relation label.
    pub relation: String,
}

/// A directed co-activation edge between two memories.
///
/// Conceptually symmetric but stored directed; strengthening always writes
/// both directions. `strength` saturates at a configured ceiling and is
/// never negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HebbianLink {
    /// The memory the edge originates from.
    pub source_id: Uuid,
    /// The memory the edge points to.
    pub target_id: Uuid,
    /// Co-activation strength, in `(0, ceiling]`.
    pub strength: f64,
    /// Number of times this pair has co-activated.
    pub coactivation_count: u64,
    /// When this link was first created.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_starts_in_working_layer_with_unit_working_strength() {
        let now = Utc::now();
        let entry = MemoryEntry::new(
            "remember this".to_string(),
            MemoryType::Factual,
            0.5,
            HashMap::new(),
            false,
            now,
        );

        assert_eq!(entry.layer, Layer::L3Working);
        assert!((entry.working_strength - 1.0).abs() < f64::EPSILON);
        assert_eq!(entry.core_strength, 0.0);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.consolidation_count, 0);
        assert_eq!(entry.created_at, now);
        assert_eq!(entry.last_accessed, now);
    }

    #[test]
    fn raw_strength_sums_both_traces() {
        let mut entry = MemoryEntry::new(
            "x".to_string(),
            MemoryType::Factual,
            0.1,
            HashMap::new(),
            false,
            Utc::now(),
        );
        entry.working_strength = 0.3;
        entry.core_strength = 0.4;
        assert!((entry.raw_strength() - 0.7).abs() < 1e-9);
    }
}
