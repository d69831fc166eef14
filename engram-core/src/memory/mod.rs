//! The [`Engram`] façade: the single entry point hosts use to add,
//! recall, consolidate, forget, and reward memories.

mod core;
mod ops;

pub use core::Engram;
pub use ops::{EngramStats, RecalledMemory};
