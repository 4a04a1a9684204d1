//! Connection resolution error types.

use thiserror::Error;

use schemaflow_cluster::ClusterError;
use schemaflow_vault::{TemplateError, VaultError};

/// Errors produced while resolving a connection URI.
///
/// Configuration errors (`EmptyConnectionSpec`, `UnsupportedValueFrom`)
/// are fatal to the resolution and never retried by the core. Not-found
/// errors are distinct from transport errors so callers can decide
/// policy.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("value and valueFrom cannot both be empty")]
    EmptyConnectionSpec,

    #[error("connection secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("key {key} missing from connection secret {namespace}/{name}")]
    SecretKeyMissing {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("unable to find supported valueFrom")]
    UnsupportedValueFrom,

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("secrets backend error: {0}")]
    Vault(#[from] VaultError),

    #[error("connection template error: {0}")]
    Template(#[from] TemplateError),
}

pub type ResolverResult<T> = Result<T, ResolverError>;
