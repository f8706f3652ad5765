use thiserror::Error;

/// Error taxonomy for the sync pipeline.
///
/// Fetch-level variants (`Unauthorized`, `Network`, `Status`, `EmptyResult`,
/// `MalformedResponse`) abort a sync before any record is touched. The
/// per-record variants (`Incomplete`, `UnsupportedLink`, `InvalidLink`,
/// `Storage`) are swallowed by the orchestrator loop and tallied in the
/// [`SyncReport`](crate::sync::SyncReport) instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("backend rejected the token")]
    Unauthorized,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("backend returned an empty server list")]
    EmptyResult,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("link carries no token parameter")]
    MissingToken,

    #[error("server record is incomplete: {0}")]
    Incomplete(String),

    #[error("unsupported share link scheme: {0}")]
    UnsupportedLink(String),

    #[error("invalid share link: {0}")]
    InvalidLink(String),

    #[error("profile storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("a sync is already in flight")]
    SyncInFlight,
}

impl SyncError {
    /// Wrap a local JSON or state-file failure as a storage error.
    pub(crate) fn storage(detail: impl std::fmt::Display) -> Self {
        Self::Storage(std::io::Error::other(detail.to_string()))
    }
}
