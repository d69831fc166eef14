//! Core data types shared across every module: the memory record itself,
//! its supporting log/link rows, its enums, and engine configuration.

mod config;
mod entry;
mod enums;

pub use config::{
    ActivationConfig, ConsolidationConfig, EngramConfig, ForgettingConfig, HebbianConfig,
    RewardConfig, SessionConfig, TypeTuning,
};
pub use entry::{AccessLogRow, GraphLink, HebbianLink, MemoryEntry};
pub use enums::{Layer, MemoryType};
