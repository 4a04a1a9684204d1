//! Phase pod and ConfigMap construction.
//!
//! Builds the ConfigMap + Pod pair that executes one phase of schema
//! work and ensures their existence. Ensure is create-if-absent: an
//! identical-key collision is success, so a partially created pair is
//! safe to re-ensure on the next reconciliation attempt.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use schema_core::{
    ConfigMap, Database, NAME_LABEL, NAMESPACE_LABEL, Pod, PodPhase, PodRole, PodSpec, ROLE_LABEL,
    SPECS_VOLUME, Table, Volume,
};
use schemaflow_cluster::{ClusterClient, ClusterError};

use crate::error::ReconcileResult;

/// Image executed by phase pods. The image reads its input from the
/// `specs` mount and writes the plan document to stdout.
const PHASE_IMAGE: &str = "schemaflow/schemaflow:latest";

/// Mount path of the phase input volume inside the pod.
const SPECS_MOUNT: &str = "/specs";

/// Builds and idempotently ensures phase execution resources.
pub struct PodOrchestrator {
    cluster: Arc<dyn ClusterClient>,
}

impl PodOrchestrator {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// The phase input ConfigMap for a table's plan phase.
    ///
    /// Deterministic name, so repeated plan attempts collide instead of
    /// accumulating.
    pub fn plan_config_map(&self, table: &Table) -> ReconcileResult<ConfigMap> {
        let encoded = serde_json::to_string(&table.spec)?;
        Ok(ConfigMap {
            name: format!("{}-plan", table.name),
            namespace: table.namespace.clone(),
            data: BTreeMap::from([("table.json".to_string(), encoded)]),
        })
    }

    /// The plan-phase pod for a table.
    ///
    /// Labeled per the routing contract and wired to the plan ConfigMap
    /// through the `specs` volume.
    pub fn plan_pod(&self, database: &Database, table: &Table, uri: &str) -> Pod {
        Pod {
            name: format!("{}-plan", table.name),
            namespace: table.namespace.clone(),
            labels: BTreeMap::from([
                (ROLE_LABEL.to_string(), PodRole::Plan.as_str().to_string()),
                (NAME_LABEL.to_string(), table.name.clone()),
                (NAMESPACE_LABEL.to_string(), table.namespace.clone()),
            ]),
            spec: PodSpec {
                image: PHASE_IMAGE.to_string(),
                args: vec![
                    "plan".to_string(),
                    "--driver".to_string(),
                    database.spec.driver.clone(),
                    "--uri".to_string(),
                    uri.to_string(),
                    "--spec-file".to_string(),
                    format!("{SPECS_MOUNT}/table.json"),
                ],
                volumes: vec![Volume {
                    name: SPECS_VOLUME.to_string(),
                    config_map: Some(format!("{}-plan", table.name)),
                }],
            },
            status: PodPhase::Pending,
        }
    }

    /// Create the ConfigMap if absent. An existing identical key is
    /// success; any other failure propagates unmodified.
    pub async fn ensure_config_map(&self, config_map: &ConfigMap) -> ReconcileResult<()> {
        match self.cluster.create_config_map(config_map).await {
            Ok(()) => Ok(()),
            Err(ClusterError::AlreadyExists { .. }) => {
                debug!(
                    namespace = %config_map.namespace,
                    name = %config_map.name,
                    "configmap already present"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create the pod if absent; same semantics as [`Self::ensure_config_map`].
    pub async fn ensure_pod(&self, pod: &Pod) -> ReconcileResult<()> {
        match self.cluster.create_pod(pod).await {
            Ok(()) => Ok(()),
            Err(ClusterError::AlreadyExists { .. }) => {
                debug!(namespace = %pod.namespace, name = %pod.name, "pod already present");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
