//! The table reconciler — the controller's top-level event loop body.
//!
//! One invocation per pod lifecycle event or plan request, driven by the
//! platform's watch/notify mechanism. The platform delivers at least
//! once and retries on error, so every path here is re-entrant:
//! creates are idempotent by name, deletes are idempotent by absence.

use std::sync::Arc;

use tracing::{debug, info};

use schema_core::{Database, Pod, PodPhase, PodRole, ROLE_LABEL, SPECS_VOLUME, Table};
use schemaflow_cluster::ClusterClient;
use schemaflow_connection::ConnectionResolver;

use crate::error::{ReconcileError, ReconcileResult};
use crate::orchestrator::PodOrchestrator;
use crate::plan_capture::PlanCapture;

/// Drives a table's schema through plan → review → apply.
///
/// This reconciler owns the `table`/`plan` pod roles. The `migrate` and
/// `apply` roles belong to the apply-phase reconciler and are skipped
/// here to avoid double-handling.
pub struct TableReconciler {
    cluster: Arc<dyn ClusterClient>,
    resolver: ConnectionResolver,
    orchestrator: PodOrchestrator,
    capture: PlanCapture,
}

impl TableReconciler {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            resolver: ConnectionResolver::new(cluster.clone()),
            orchestrator: PodOrchestrator::new(cluster.clone()),
            capture: PlanCapture::new(cluster.clone()),
            cluster,
        }
    }

    /// Handle one pod lifecycle event.
    ///
    /// Pods that are not ours (wrong or missing role labels) and pods
    /// that have not reached terminal success produce no side effects.
    /// On terminal success: capture the plan, then delete the pod, then
    /// its companion ConfigMap. If capture fails nothing is deleted and
    /// the platform redelivers the event.
    pub async fn reconcile_pod(&self, pod: &Pod) -> ReconcileResult<()> {
        let Some(role_value) = pod.label(ROLE_LABEL) else {
            return Ok(());
        };
        let Some(role) = PodRole::parse(role_value) else {
            debug!(pod = %pod.name, role = %role_value, "unrecognized pod role, ignoring");
            return Ok(());
        };

        match role {
            PodRole::Migrate | PodRole::Apply => {
                // Owned by the apply-phase reconciler.
                return Ok(());
            }
            PodRole::Table | PodRole::Plan => {}
        }

        if pod.status != PodPhase::Succeeded {
            // Failure handling for failed pods is the platform's concern;
            // this event type only acts on terminal success.
            return Ok(());
        }

        debug!(
            pod = %pod.name,
            namespace = %pod.namespace,
            role = role.as_str(),
            "reconciling completed phase pod"
        );

        let Some(migration) = self.capture.capture(pod).await? else {
            return Ok(());
        };

        self.cluster.delete_pod(&pod.namespace, &pod.name).await?;

        let config_map_name = pod
            .spec
            .volumes
            .iter()
            .find(|volume| volume.name == SPECS_VOLUME)
            .and_then(|volume| volume.config_map.clone())
            .ok_or_else(|| ReconcileError::MissingSpecsVolume {
                pod: pod.name.clone(),
            })?;
        self.cluster
            .delete_config_map(&pod.namespace, &config_map_name)
            .await?;

        info!(
            migration = %migration.name,
            pod = %pod.name,
            "plan captured, ephemeral resources removed"
        );
        Ok(())
    }

    /// Initiate the plan phase for a table.
    ///
    /// Resolves credentials, then ensures the phase ConfigMap before the
    /// pod — the input volume must exist before the pod is scheduled.
    /// Returns on first failure; the next attempt re-ensures whatever
    /// already exists.
    pub async fn plan(&self, database: &Database, table: &Table) -> ReconcileResult<()> {
        debug!(table = %table.name, database = %database.name, "starting plan phase");

        let connection = self.resolver.resolve_connection_uri(database).await?;
        let config_map = self.orchestrator.plan_config_map(table)?;
        let pod = self.orchestrator.plan_pod(database, table, &connection.uri);

        self.orchestrator.ensure_config_map(&config_map).await?;
        self.orchestrator.ensure_pod(&pod).await?;

        info!(table = %table.name, pod = %pod.name, "plan pod ensured");
        Ok(())
    }
}
