//! The orchestration-API client seam.
//!
//! Every component takes a `ClusterClient` handle at construction time;
//! the concrete client is owned by the process entry point. The store is
//! the single source of truth — no implementation may cache authoritative
//! state across calls.

use async_trait::async_trait;

use schema_core::{ConfigMap, Database, Migration, Pod, Secret, Table};

use crate::error::ClusterResult;

/// Typed access to the orchestration platform's object store.
///
/// Semantics every implementation must honor:
/// - `get_*` returns `Ok(None)` for absent objects; absence is not an
///   error at this layer.
/// - `create_*` fails with [`crate::ClusterError::AlreadyExists`] when
///   the key is taken, keeping the collision observable to callers.
/// - `delete_*` is idempotent: deleting an absent object succeeds.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_database(&self, namespace: &str, name: &str) -> ClusterResult<Option<Database>>;

    async fn get_table(&self, namespace: &str, name: &str) -> ClusterResult<Option<Table>>;

    async fn get_secret(&self, namespace: &str, name: &str) -> ClusterResult<Option<Secret>>;

    async fn get_config_map(&self, namespace: &str, name: &str)
    -> ClusterResult<Option<ConfigMap>>;

    async fn get_migration(&self, namespace: &str, name: &str)
    -> ClusterResult<Option<Migration>>;

    async fn create_migration(&self, migration: &Migration) -> ClusterResult<()>;

    async fn create_config_map(&self, config_map: &ConfigMap) -> ClusterResult<()>;

    async fn create_pod(&self, pod: &Pod) -> ClusterResult<()>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    async fn delete_config_map(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    /// Fetch a pod's complete log output, fully buffered.
    ///
    /// Plan output is a small line-oriented text artifact, not an
    /// unbounded stream.
    async fn pod_logs(&self, namespace: &str, name: &str) -> ClusterResult<String>;

    /// The bound service-account token for a namespace, forwarded to the
    /// secrets backend as proof of identity.
    async fn service_account_token(&self, namespace: &str) -> ClusterResult<String>;
}
