#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Engram
//!
//! An embeddable memory-dynamics engine for autonomous agents: activation
//! ranking, dual-trace consolidation, Ebbinghaus forgetting, Hebbian
//! association, confidence scoring, reward shaping, and anomaly tracking
//! over a pluggable [`store::StorageBackend`].
//!
//! ## Module Organization
//!
//! - [`memory`]: the [`memory::Engram`] façade — the API most hosts use
//! - [`store`]: the [`store::StorageBackend`] trait and an in-memory
//!   reference implementation
//! - [`activation`]: base-level and spreading activation, the recall
//!   ranking procedure
//! - [`consolidation`]: the dual-trace (Memory-Chain) consolidation cycle
//! - [`forgetting`]: stability, retrievability, pruning, and
//!   retrieval-induced suppression
//! - [`hebbian`]: co-activation link strengthening and entity-graph
//!   traversal
//! - [`confidence`]: reliability/salience combination and labeling
//! - [`reward`]: feedback-polarity detection and importance shaping
//! - [`anomaly`]: rolling-window anomaly tracking for host-defined metrics
//! - [`session`]: per-session bounded, decaying working-memory sets
//! - [`types`]: the shared data model and engine configuration
//!
//! ## Quick Start
//!
//! ```
//! use engram_core::{Engram, MemoryType};
//! use engram_core::store::InMemoryStore;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = Engram::new(Arc::new(InMemoryStore::new()));
//!
//! let id = engine
//!     .add(
//!         "the deploy key rotates every 90 days",
//!         MemoryType::Factual,
//!         0.7,
//!         HashMap::new(),
//!         false,
//!         None,
//!     )
//!     .await
//!     .unwrap();
//!
//! let results = engine.recall("deploy key rotation", 5, false).await.unwrap();
//! assert_eq!(results[0].ranked.entry.id, id);
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result<T>`]:
//!
//! ```no_run
//! use engram_core::{Error, Result};
//!
//! async fn example() -> Result<()> {
//!     // Operations that can fail
//!     // .await?
//!     Ok(())
//! }
//! ```

pub mod activation;
pub mod anomaly;
pub mod confidence;
pub mod consolidation;
pub mod error;
pub mod forgetting;
pub mod hebbian;
pub mod memory;
pub mod reward;
pub mod retry;
pub mod session;
pub mod store;
pub mod tracing;
pub mod types;

pub use error::{Error, Result};
pub use memory::{Engram, EngramStats, RecalledMemory};
pub use types::{
    ActivationConfig, ConsolidationConfig, EngramConfig, ForgettingConfig, GraphLink,
    HebbianConfig, HebbianLink, Layer, MemoryEntry, MemoryType, RewardConfig, SessionConfig,
    TypeTuning,
};
