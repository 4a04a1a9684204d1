//! Plan capture — turning a finished plan pod into a migration record.
//!
//! The planner pod's stdout is the inter-process protocol: one opaque,
//! line-oriented plan document with a single normalization rule (runs of
//! blank lines collapse to nothing). The captured document is persisted
//! as a Migration named by the table's content hash, which makes the
//! whole capture idempotent under redelivered events.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use schema_core::{
    Migration, MigrationSpec, MigrationStatus, NAME_LABEL, NAMESPACE_LABEL, OwnerReference, Pod,
};
use schemaflow_cluster::{ClusterClient, ClusterError};

use crate::error::{ReconcileError, ReconcileResult};

/// Collapse every run of consecutive newlines to a single newline.
///
/// The planner plans each row independently and can leave blank lines
/// between statements.
pub fn collapse_blank_lines(output: &str) -> String {
    let mut out = output.to_string();
    while out.contains("\n\n") {
        out = out.replace("\n\n", "\n");
    }
    out
}

/// Harvests plan output and materializes the migration record.
pub struct PlanCapture {
    cluster: Arc<dyn ClusterClient>,
}

impl PlanCapture {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// Capture a completed plan pod's output as a Migration.
    ///
    /// Returns `Ok(None)` when the pod lacks the owning-table labels;
    /// such an event is not ours to handle. An existing migration with
    /// the same content hash is success, not a collision.
    pub async fn capture(&self, pod: &Pod) -> ReconcileResult<Option<Migration>> {
        let output = self.cluster.pod_logs(&pod.namespace, &pod.name).await?;
        let ddl = collapse_blank_lines(&output);

        let Some(table_name) = pod.label(NAME_LABEL) else {
            debug!(pod = %pod.name, "pod has no table name label, skipping");
            return Ok(None);
        };
        let Some(table_namespace) = pod.label(NAMESPACE_LABEL) else {
            debug!(pod = %pod.name, "pod has no table namespace label, skipping");
            return Ok(None);
        };

        let table = self
            .cluster
            .get_table(table_namespace, table_name)
            .await?
            .ok_or_else(|| ReconcileError::TableNotFound {
                namespace: table_namespace.to_string(),
                name: table_name.to_string(),
            })?;
        let sha = table.content_sha()?;

        let migration = Migration {
            name: sha,
            namespace: table.namespace.clone(),
            spec: MigrationSpec {
                generated_ddl: ddl,
                table_name: table.name.clone(),
                table_namespace: table.namespace.clone(),
                database_name: table.spec.database.clone(),
            },
            status: MigrationStatus {
                planned_at: Some(epoch_secs()),
                applied_at: None,
            },
            owner: Some(OwnerReference {
                kind: "Table".to_string(),
                name: table.name.clone(),
            }),
        };

        match self.cluster.create_migration(&migration).await {
            Ok(()) => {
                info!(
                    migration = %migration.name,
                    table = %table.name,
                    namespace = %table.namespace,
                    "migration recorded"
                );
            }
            Err(ClusterError::AlreadyExists { .. }) => {
                debug!(
                    migration = %migration.name,
                    "migration already recorded for this content hash"
                );
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Some(migration))
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use schema_core::{PodPhase, PodSpec, ROLE_LABEL, SPECS_VOLUME, Table, TableSpec, Volume};
    use schemaflow_cluster::MemoryCluster;

    #[test]
    fn collapses_single_blank_lines() {
        assert_eq!(
            collapse_blank_lines("CREATE TABLE x;\n\nALTER TABLE y;\n\n"),
            "CREATE TABLE x;\nALTER TABLE y;\n"
        );
    }

    #[test]
    fn collapses_runs_of_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\n"), "a\nb\n");
    }

    #[test]
    fn leaves_dense_output_untouched() {
        assert_eq!(collapse_blank_lines("a\nb\nc\n"), "a\nb\nc\n");
        assert_eq!(collapse_blank_lines(""), "");
    }

    fn test_table() -> Table {
        Table {
            name: "users".to_string(),
            namespace: "default".to_string(),
            spec: TableSpec {
                database: "appdb".to_string(),
                schema: serde_json::json!({"columns": ["id"]}),
            },
        }
    }

    fn plan_pod() -> Pod {
        Pod {
            name: "users-plan".to_string(),
            namespace: "default".to_string(),
            labels: BTreeMap::from([
                (ROLE_LABEL.to_string(), "plan".to_string()),
                (NAME_LABEL.to_string(), "users".to_string()),
                (NAMESPACE_LABEL.to_string(), "default".to_string()),
            ]),
            spec: PodSpec {
                image: "schemaflow/schemaflow:latest".to_string(),
                args: vec![],
                volumes: vec![Volume {
                    name: SPECS_VOLUME.to_string(),
                    config_map: Some("users-plan".to_string()),
                }],
            },
            status: PodPhase::Succeeded,
        }
    }

    async fn seeded_cluster() -> MemoryCluster {
        let cluster = MemoryCluster::new();
        cluster.insert_table(test_table()).await;
        cluster.insert_pod(plan_pod()).await;
        cluster
            .set_pod_logs("default", "users-plan", "CREATE TABLE users;\n\n")
            .await;
        cluster
    }

    #[tokio::test]
    async fn capture_builds_migration_named_by_content_hash() {
        let cluster = seeded_cluster().await;
        let capture = PlanCapture::new(Arc::new(cluster.clone()));

        let migration = capture.capture(&plan_pod()).await.unwrap().unwrap();
        assert_eq!(migration.name, test_table().content_sha().unwrap());
        assert_eq!(migration.spec.generated_ddl, "CREATE TABLE users;\n");
        assert_eq!(migration.spec.table_name, "users");
        assert_eq!(migration.spec.database_name, "appdb");
        assert!(migration.status.planned_at.is_some());
        assert!(migration.status.applied_at.is_none());
    }

    #[tokio::test]
    async fn capture_sets_owner_to_source_table() {
        let cluster = seeded_cluster().await;
        let capture = PlanCapture::new(Arc::new(cluster));

        let migration = capture.capture(&plan_pod()).await.unwrap().unwrap();
        let owner = migration.owner.unwrap();
        assert_eq!(owner.kind, "Table");
        assert_eq!(owner.name, "users");
    }

    #[tokio::test]
    async fn second_capture_for_same_state_is_not_an_error() {
        let cluster = seeded_cluster().await;
        let capture = PlanCapture::new(Arc::new(cluster.clone()));

        capture.capture(&plan_pod()).await.unwrap();
        capture.capture(&plan_pod()).await.unwrap();
        assert_eq!(cluster.migration_count().await, 1);
    }

    #[tokio::test]
    async fn capture_without_table_labels_is_a_noop() {
        let cluster = seeded_cluster().await;
        let capture = PlanCapture::new(Arc::new(cluster.clone()));

        let mut pod = plan_pod();
        pod.labels.remove(NAME_LABEL);
        assert!(capture.capture(&pod).await.unwrap().is_none());

        let mut pod = plan_pod();
        pod.labels.remove(NAMESPACE_LABEL);
        assert!(capture.capture(&pod).await.unwrap().is_none());

        assert_eq!(cluster.migration_count().await, 0);
    }

    #[tokio::test]
    async fn capture_fails_when_table_is_gone() {
        let cluster = MemoryCluster::new();
        cluster.insert_pod(plan_pod()).await;
        cluster
            .set_pod_logs("default", "users-plan", "CREATE TABLE users;\n")
            .await;
        let capture = PlanCapture::new(Arc::new(cluster));

        let err = capture.capture(&plan_pod()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::TableNotFound { .. }));
    }
}
