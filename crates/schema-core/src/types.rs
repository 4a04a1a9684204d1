//! API object model for schemaflow.
//!
//! These types mirror the orchestration platform's object kinds that the
//! controller reads and writes: declared databases and tables, immutable
//! migration records, and the ephemeral ConfigMap/Pod pairs that execute
//! one phase of schema work. All types serialize to/from JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ── Database ──────────────────────────────────────────────────────

/// A declared target database, owned by the cluster operator.
///
/// The controller only reads these; it never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Database {
    pub name: String,
    pub namespace: String,
    pub spec: DatabaseSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSpec {
    /// Driver identifier: "postgres", "mysql", etc.
    pub driver: String,
    /// How to obtain the connection URI.
    pub connection: ValueOrValueFrom,
}

/// A connection value that is either literal or sourced indirectly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueOrValueFrom {
    /// Literal connection URI. Highest priority when non-empty.
    #[serde(default)]
    pub value: Option<String>,
    /// Indirect source, consulted only when `value` is unset.
    #[serde(default)]
    pub value_from: Option<ValueFrom>,
}

/// Union of supported indirect connection sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueFrom {
    /// Static secret lookup.
    #[serde(default)]
    pub secret_key_ref: Option<SecretKeyRef>,
    /// Dynamic-secret backend descriptor.
    #[serde(default)]
    pub vault: Option<VaultConnection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretKeyRef {
    /// Secret name, looked up in the database's namespace.
    pub name: String,
    /// Key within the secret's data map.
    pub key: String,
}

/// Descriptor for credentials minted on demand by a secrets backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VaultConnection {
    /// Base URL of the secrets backend.
    pub endpoint: String,
    /// Authentication role presented at login.
    pub role: String,
    /// Name of the dynamic credential under the database secrets engine.
    pub secret: String,
    /// Inline connection-string template. When unset, the template is
    /// fetched from the backend's stored configuration for the database.
    #[serde(default)]
    pub connection_template: Option<String>,
}

// ── Table ─────────────────────────────────────────────────────────

/// One declared schema object belonging to a `Database`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub name: String,
    pub namespace: String,
    pub spec: TableSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSpec {
    /// Name of the owning `Database` object.
    pub database: String,
    /// Desired schema state. Opaque to the controller; validated and
    /// interpreted by the planner pod.
    pub schema: serde_json::Value,
}

impl Table {
    /// Deterministic content hash of the desired schema state.
    ///
    /// Hex SHA-256 over the canonical JSON encoding of the spec. Two
    /// tables with the same desired state hash identically, which makes
    /// the hash usable as a migration identity.
    pub fn content_sha(&self) -> Result<String, serde_json::Error> {
        let encoded = serde_json::to_vec(&self.spec)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }
}

// ── Migration ─────────────────────────────────────────────────────

/// An immutable record of one planned schema change.
///
/// Named by the source table's content hash, so re-planning the same
/// desired state collides on the same object name instead of creating
/// a duplicate record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Migration {
    pub name: String,
    pub namespace: String,
    pub spec: MigrationSpec,
    pub status: MigrationStatus,
    /// Ownership relation: must reference the source `Table` so the
    /// platform garbage-collects the migration with it.
    #[serde(default)]
    pub owner: Option<OwnerReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSpec {
    /// Normalized planner output, treated as one opaque plan document.
    pub generated_ddl: String,
    pub table_name: String,
    pub table_namespace: String,
    pub database_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    /// Unix timestamp (seconds) when the plan phase recorded this change.
    #[serde(default)]
    pub planned_at: Option<u64>,
    /// Unix timestamp (seconds) when the change was applied. Set by the
    /// apply-approval step, never by the plan phase.
    #[serde(default)]
    pub applied_at: Option<u64>,
}

/// Declared ownership relation between two namespaced objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
}

// ── ConfigMap / Secret ────────────────────────────────────────────

/// Phase input carrier, mounted into the phase pod under `specs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigMap {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,
}

/// A static secret in the object store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

// ── Pod ───────────────────────────────────────────────────────────

/// An ephemeral execution unit running one phase of schema work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    /// Routing labels; see the label contract in [`crate::labels`].
    pub labels: BTreeMap<String, String>,
    pub spec: PodSpec,
    pub status: PodPhase,
}

impl Pod {
    /// Look up a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodSpec {
    pub image: String,
    pub args: Vec<String>,
    pub volumes: Vec<Volume>,
}

/// A pod volume. Only ConfigMap-backed volumes are relevant to the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    /// Name of the backing ConfigMap, when ConfigMap-sourced.
    #[serde(default)]
    pub config_map: Option<String>,
}

/// Pod lifecycle phase as reported by the orchestration platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}
