//! Cluster API error types.

use thiserror::Error;

/// Errors surfaced by the orchestration-API boundary.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Creation collided with an existing object of the same key.
    /// Callers with ensure semantics treat this as success.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// A migration was submitted without a valid owning table.
    #[error("migration owner must reference its source table: {0}")]
    InvalidOwner(String),

    /// Transport or server-side failure talking to the orchestration API.
    #[error("cluster api error: {0}")]
    Api(String),
}

pub type ClusterResult<T> = Result<T, ClusterError>;
