use std::path::PathBuf;

/// Configuration for opening a [`crate::store::Store`].
///
/// Two configuration options from the collaborator-facing surface
/// (`publisher_selector`, `port`) are not represented here: they belong to
/// the event-bus and dashboard layers, which sit outside the core.
#[derive(Debug, Clone)]
pub struct Config {
    /// File path to the SQLite database. Use `":memory:"` for an ephemeral
    /// store, primarily useful in tests.
    pub store_path: PathBuf,
    /// How long a connection waits on a locked database before failing with
    /// `Error::Retriable`.
    pub busy_timeout_ms: u32,
}

impl Config {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Config {
            store_path: store_path.into(),
            busy_timeout_ms: 5_000,
        }
    }
}
