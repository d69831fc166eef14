use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Cognitive category of a memory.
///
/// Controls the default decay rate (used by [`crate::forgetting::stability`])
/// and the default reliability baseline (used by
/// [`crate::confidence::reliability`]).
///
/// # Examples
///
/// ```
/// use engram_core::MemoryType;
///
/// let fact = MemoryType::Factual;       // a stated fact
/// let event = MemoryType::Episodic;     // something that happened
/// let how_to = MemoryType::Procedural;  // a learned procedure
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryType {
    /// A stated fact ("the deploy key rotates every 90 days").
    Factual,
    /// A recollection of a specific event.
    Episodic,
    /// A relationship between entities ("Alice reports to Bob").
    Relational,
    /// An affect-laden memory ("the user was frustrated by the outage").
    Emotional,
    /// A learned procedure or how-to.
    Procedural,
    /// A stated preference or opinion, not a verifiable fact.
    Opinion,
}

impl MemoryType {
    /// All variants, in a stable order (used by presets and tests).
    #[must_use]
    pub const fn all() -> [MemoryType; 6] {
        [
            MemoryType::Factual,
            MemoryType::Episodic,
            MemoryType::Relational,
            MemoryType::Emotional,
            MemoryType::Procedural,
            MemoryType::Opinion,
        ]
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryType::Factual => write!(f, "factual"),
            MemoryType::Episodic => write!(f, "episodic"),
            MemoryType::Relational => write!(f, "relational"),
            MemoryType::Emotional => write!(f, "emotional"),
            MemoryType::Procedural => write!(f, "procedural"),
            MemoryType::Opinion => write!(f, "opinion"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "factual" => Ok(MemoryType::Factual),
            "episodic" => Ok(MemoryType::Episodic),
            "relational" => Ok(MemoryType::Relational),
            "emotional" => Ok(MemoryType::Emotional),
            "procedural" => Ok(MemoryType::Procedural),
            "opinion" => Ok(MemoryType::Opinion),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// Coarse lifecycle layer of a memory.
///
/// There is no `L1` in the core — it is reserved for host-level identity
/// memories that never pass through this engine.
///
/// # Examples
///
/// ```
/// use engram_core::Layer;
///
/// let fresh = Layer::L3Working;   // where new entries start
/// let kept = Layer::L2Core;       // consolidated, frequently-used
/// let dormant = Layer::L4Archive; // retained but not recalled by default
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Consolidated / important memories, exempt from archival by default.
    L2Core,
    /// Newly created or not-yet-consolidated memories.
    L3Working,
    /// Dormant but retained; excluded from default recall.
    L4Archive,
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::L2Core => write!(f, "L2_core"),
            Layer::L3Working => write!(f, "L3_working"),
            Layer::L4Archive => write!(f, "L4_archive"),
        }
    }
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "L2_core" => Ok(Layer::L2Core),
            "L3_working" => Ok(Layer::L3Working),
            "L4_archive" => Ok(Layer::L4Archive),
            other => Err(format!("unknown layer: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn memory_type_round_trips_through_display_and_from_str() {
        for t in MemoryType::all() {
            assert_eq!(MemoryType::from_str(&t.to_string()).unwrap(), t);
        }
    }

    #[test]
    fn layer_round_trips_through_display_and_from_str() {
        for l in [Layer::L2Core, Layer::L3Working, Layer::L4Archive] {
            assert_eq!(Layer::from_str(&l.to_string()).unwrap(), l);
        }
    }

    #[test]
    fn unknown_memory_type_is_rejected() {
        assert!(MemoryType::from_str("vibes").is_err());
    }
}
