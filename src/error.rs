//! Error type shared by every thread operation.
//!
//! Misuse of the API (duplicate names, waiting on yourself, double
//! rendezvous requests) and platform failures are reported as
//! [`ThreadError`] values. Registry exhaustion and an unregistered caller
//! are not errors: they terminate the process.

use std::io;

/// Errors returned by thread lifecycle and rendezvous operations.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("a thread named '{0}' already exists")]
    DuplicateName(String),

    #[error("thread '{0}' is already running")]
    AlreadyRunning(String),

    #[error("thread '{0}' is not running")]
    NotRunning(String),

    #[error("thread '{0}' cannot wait for its own death")]
    WaitForSelf(String),

    #[error("thread '{0}' cannot sync with itself")]
    SyncWithSelf(String),

    #[error("thread '{name}' already has a sync request from '{requester}'")]
    AlreadySynced { name: String, requester: String },

    #[error("only the thread that synced with '{0}' may release it")]
    NotSyncRequester(String),

    #[error("{op} may only be called by thread '{name}' itself")]
    NotThisThread { name: String, op: &'static str },

    #[error("a primary thread is already set ('{0}')")]
    PrimaryAlreadySet(String),

    #[error("timed out during {op} on thread '{name}'")]
    Timeout { name: String, op: &'static str },

    #[error("failed to start thread '{name}': {source}")]
    StartFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{op} failed on thread '{name}': {source}")]
    Platform {
        name: String,
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ThreadError {
    /// Returns true for the timeout sub-kind of platform errors.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ThreadError::Timeout { .. })
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ThreadError>;
