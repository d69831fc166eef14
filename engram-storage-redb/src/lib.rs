#![allow(clippy::missing_errors_doc)]

//! # Engram Storage (redb)
//!
//! A durable [`engram_core::store::StorageBackend`] implementation backed
//! by [redb](https://docs.rs/redb), an embedded key-value database.
//!
//! Every table holds postcard-encoded values; collections (access history,
//! graph links, Hebbian neighbors) are stored as a single encoded `Vec<T>`
//! per key, read and rewritten whole on each update. All redb operations
//! are synchronous, so every method wraps its transaction in
//! [`tokio::task::spawn_blocking`].
//!
//! ## Example
//!
//! ```no_run
//! use engram_storage_redb::RedbStore;
//! use std::path::Path;
//!
//! # async fn example() -> engram_core::Result<()> {
//! let store = RedbStore::open(Path::new("./engram.redb"))?;
//! # Ok(())
//! # }
//! ```

mod store;
mod tables;

use redb::Database;
use std::path::Path;
use std::sync::Arc;

use engram_core::error::Error;

/// A durable store backed by a single redb database file.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (creating if absent) a redb database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageFailure`] if the database file cannot be
    /// opened or created.
    pub fn open(path: &Path) -> engram_core::Result<Self> {
        let db = Database::create(path)
            .map_err(|e| Error::StorageFailure(format!("failed to open redb database: {e}")))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// A store backed by a fresh file inside `dir`, useful for tests that
    /// want a disposable database tied to a [`tempfile::TempDir`].
    #[cfg(test)]
    pub fn open_in(dir: &tempfile::TempDir) -> engram_core::Result<Self> {
        Self::open(&dir.path().join("engram.redb"))
    }
}
