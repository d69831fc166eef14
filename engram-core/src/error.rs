use uuid::Uuid;

/// Result type alias for Engram operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the memory-dynamics engine.
///
/// Mirrors the error taxonomy in the specification: input validation,
/// missing entries, storage failures, and configuration mistakes are
/// distinguished so hosts can decide what to retry and what to surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty content, unknown memory type, negative importance, or an
    /// unknown id reference (e.g. `contradicts` pointing at nothing).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An id-targeted operation (`get`, `forget`, `pin`, ...) referenced a
    /// memory that does not exist.
    #[error("memory not found: {0}")]
    NotFound(Uuid),

    /// The underlying `StorageBackend` refused or timed out.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// A configuration value was out of its valid range (e.g. a
    /// downscaling `factor` not in `(0, 1]`).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Serialization failure when persisting or exporting state.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure (export/close path).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a host may retry this error with backoff.
    ///
    /// Only failures attributable to a transient external condition
    /// (storage, I/O) are recoverable; validation and configuration
    /// mistakes will fail identically on retry.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StorageFailure(_) | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failure_is_recoverable() {
        assert!(Error::StorageFailure("timeout".into()).is_recoverable());
    }

    #[test]
    fn invalid_input_is_not_recoverable() {
        assert!(!Error::InvalidInput("empty content".into()).is_recoverable());
    }

    #[test]
    fn not_found_is_not_recoverable() {
        assert!(!Error::NotFound(Uuid::new_v4()).is_recoverable());
    }

    #[test]
    fn config_error_is_not_recoverable() {
        assert!(!Error::ConfigError("factor out of range".into()).is_recoverable());
    }
}
