//! Error types for branch provisioning.
//!
//! Every failure either resolves transparently (lock retry) or surfaces here.
//! Test code is expected to propagate these with `?` or `expect`, which aborts
//! the test the same way a broken environment should.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NeonError {
    /// A required configuration value is absent.
    #[error("missing required configuration value: {0}")]
    MissingConfig(&'static str),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("{operation}: http client error: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: error decoding {type_name} Url: {url} Body: {body}")]
    Decode {
        operation: &'static str,
        type_name: &'static str,
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation}: unexpected status code Status: {status} Url: {url} Body: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        url: String,
        body: String,
    },

    /// The service holds a lock on the project or branch (HTTP 423).
    #[error("{operation}: resource is locked, retry later")]
    Locked { operation: &'static str },

    #[error("failed to create branch {branch} after {attempts} attempts: {elapsed:?}")]
    LockTimeout {
        branch: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("error creating branch {branch}, parent branch '{parent}' not found")]
    ParentNotFound { branch: String, parent: String },

    #[error("branch {0} was created without a connection uri")]
    NoConnectionUri(String),
}

impl NeonError {
    pub fn is_locked(&self) -> bool {
        matches!(self, NeonError::Locked { .. })
    }
}

pub type Result<T> = std::result::Result<T, NeonError>;
