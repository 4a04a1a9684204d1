//! Controller error types.

use thiserror::Error;

use schemaflow_cluster::ClusterError;
use schemaflow_connection::ResolverError;

/// Errors surfaced from one reconciliation invocation.
///
/// Every variant aborts the current event; the platform's redelivery
/// mechanism is the retry loop. Deliberate no-op branches in the
/// reconciler are not errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("table {namespace}/{name} not found")]
    TableNotFound { namespace: String, name: String },

    /// A succeeded phase pod without the `specs` input volume cannot be
    /// cleaned up; its ConfigMap is unlocatable.
    #[error("phase pod {pod} has no specs volume")]
    MissingSpecsVolume { pod: String },

    #[error("failed to encode table spec: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("connection resolution failed: {0}")]
    Resolver(#[from] ResolverError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
