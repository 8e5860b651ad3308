//! Error types for the session layer.

use std::path::PathBuf;

/// Errors that can occur while reading or writing the persisted session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backing file couldn't be read, written, or renamed into place.
    #[error("session store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but isn't a JSON object of strings.
    /// Usually a hand-edited or truncated file.
    #[error("session store at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory entries couldn't be serialized.
    #[error("failed to encode session store: {0}")]
    Encode(#[source] serde_json::Error),

    /// Another thread panicked while holding the store's lock.
    #[error("session store lock poisoned")]
    Poisoned,
}
