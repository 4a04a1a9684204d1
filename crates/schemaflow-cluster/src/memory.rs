//! In-memory `ClusterClient` for tests and local development.
//!
//! Behaves like the real object store at the semantics the controller
//! depends on: create collides on existing keys, delete is idempotent,
//! and migration creation enforces the owner-reference invariant. Every
//! trait call is appended to an operation journal so tests can assert
//! call ordering and the absence of side effects.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use schema_core::{ConfigMap, Database, Migration, Pod, Secret, Table};

use crate::client::ClusterClient;
use crate::error::{ClusterError, ClusterResult};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct Inner {
    databases: HashMap<Key, Database>,
    tables: HashMap<Key, Table>,
    secrets: HashMap<Key, Secret>,
    config_maps: HashMap<Key, ConfigMap>,
    pods: HashMap<Key, Pod>,
    migrations: HashMap<Key, Migration>,
    pod_logs: HashMap<Key, String>,
    service_account_tokens: HashMap<String, String>,
    ops: Vec<String>,
}

/// In-memory object store keyed by (namespace, name) per kind.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding helpers ────────────────────────────────────────────

    pub async fn insert_database(&self, database: Database) {
        let mut inner = self.inner.lock().await;
        inner
            .databases
            .insert(key(&database.namespace, &database.name), database);
    }

    pub async fn insert_table(&self, table: Table) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(key(&table.namespace, &table.name), table);
    }

    pub async fn insert_secret(&self, secret: Secret) {
        let mut inner = self.inner.lock().await;
        inner
            .secrets
            .insert(key(&secret.namespace, &secret.name), secret);
    }

    pub async fn insert_pod(&self, pod: Pod) {
        let mut inner = self.inner.lock().await;
        inner.pods.insert(key(&pod.namespace, &pod.name), pod);
    }

    /// Seed the canned log output returned by [`ClusterClient::pod_logs`].
    pub async fn set_pod_logs(&self, namespace: &str, name: &str, logs: &str) {
        let mut inner = self.inner.lock().await;
        inner.pod_logs.insert(key(namespace, name), logs.to_string());
    }

    pub async fn set_service_account_token(&self, namespace: &str, token: &str) {
        let mut inner = self.inner.lock().await;
        inner
            .service_account_tokens
            .insert(namespace.to_string(), token.to_string());
    }

    // ── Test observability ─────────────────────────────────────────

    /// The ordered journal of every trait call made against this store.
    pub async fn ops(&self) -> Vec<String> {
        self.inner.lock().await.ops.clone()
    }

    pub async fn migration_count(&self) -> usize {
        self.inner.lock().await.migrations.len()
    }

    pub async fn pod_exists(&self, namespace: &str, name: &str) -> bool {
        self.inner.lock().await.pods.contains_key(&key(namespace, name))
    }

    pub async fn config_map_exists(&self, namespace: &str, name: &str) -> bool {
        self.inner
            .lock()
            .await
            .config_maps
            .contains_key(&key(namespace, name))
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn get_database(&self, namespace: &str, name: &str) -> ClusterResult<Option<Database>> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("get-database {namespace}/{name}"));
        Ok(inner.databases.get(&key(namespace, name)).cloned())
    }

    async fn get_table(&self, namespace: &str, name: &str) -> ClusterResult<Option<Table>> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("get-table {namespace}/{name}"));
        Ok(inner.tables.get(&key(namespace, name)).cloned())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> ClusterResult<Option<Secret>> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("get-secret {namespace}/{name}"));
        Ok(inner.secrets.get(&key(namespace, name)).cloned())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<ConfigMap>> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("get-configmap {namespace}/{name}"));
        Ok(inner.config_maps.get(&key(namespace, name)).cloned())
    }

    async fn get_migration(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<Migration>> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("get-migration {namespace}/{name}"));
        Ok(inner.migrations.get(&key(namespace, name)).cloned())
    }

    async fn create_migration(&self, migration: &Migration) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!(
            "create-migration {}/{}",
            migration.namespace, migration.name
        ));

        // Owner-reference invariant: the migration must be owned by an
        // existing table in its namespace.
        let owner = migration.owner.as_ref().ok_or_else(|| {
            ClusterError::InvalidOwner(format!("{}/{} has no owner", migration.namespace, migration.name))
        })?;
        if owner.kind != "Table"
            || !inner
                .tables
                .contains_key(&key(&migration.namespace, &owner.name))
        {
            return Err(ClusterError::InvalidOwner(format!(
                "{} {} does not name a table in namespace {}",
                owner.kind, owner.name, migration.namespace
            )));
        }

        let k = key(&migration.namespace, &migration.name);
        if inner.migrations.contains_key(&k) {
            return Err(ClusterError::AlreadyExists {
                kind: "migration",
                namespace: migration.namespace.clone(),
                name: migration.name.clone(),
            });
        }
        inner.migrations.insert(k, migration.clone());
        debug!(namespace = %migration.namespace, name = %migration.name, "migration stored");
        Ok(())
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!(
            "create-configmap {}/{}",
            config_map.namespace, config_map.name
        ));
        let k = key(&config_map.namespace, &config_map.name);
        if inner.config_maps.contains_key(&k) {
            return Err(ClusterError::AlreadyExists {
                kind: "configmap",
                namespace: config_map.namespace.clone(),
                name: config_map.name.clone(),
            });
        }
        inner.config_maps.insert(k, config_map.clone());
        Ok(())
    }

    async fn create_pod(&self, pod: &Pod) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .ops
            .push(format!("create-pod {}/{}", pod.namespace, pod.name));
        let k = key(&pod.namespace, &pod.name);
        if inner.pods.contains_key(&k) {
            return Err(ClusterError::AlreadyExists {
                kind: "pod",
                namespace: pod.namespace.clone(),
                name: pod.name.clone(),
            });
        }
        inner.pods.insert(k, pod.clone());
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("delete-pod {namespace}/{name}"));
        inner.pods.remove(&key(namespace, name));
        Ok(())
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("delete-configmap {namespace}/{name}"));
        inner.config_maps.remove(&key(namespace, name));
        Ok(())
    }

    async fn pod_logs(&self, namespace: &str, name: &str) -> ClusterResult<String> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("pod-logs {namespace}/{name}"));
        inner
            .pod_logs
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                kind: "pod",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn service_account_token(&self, namespace: &str) -> ClusterResult<String> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(format!("service-account-token {namespace}"));
        inner
            .service_account_tokens
            .get(namespace)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                kind: "serviceaccount",
                namespace: namespace.to_string(),
                name: "default".to_string(),
            })
    }
}
