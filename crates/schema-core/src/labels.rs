//! Pod label contract shared by the orchestrator and the reconcilers.
//!
//! Labels are the sole routing key used to associate pod lifecycle
//! events back to the owning table. A pod without the expected labels
//! is not an error; it simply is not ours.

use crate::types::Pod;

/// Label carrying the phase role of a pod.
pub const ROLE_LABEL: &str = "schemahero-role";
/// Label carrying the owning table's name.
pub const NAME_LABEL: &str = "schemahero-name";
/// Label carrying the owning table's namespace.
pub const NAMESPACE_LABEL: &str = "schemahero-namespace";

/// Volume name of the phase input ConfigMap mount.
pub const SPECS_VOLUME: &str = "specs";

/// Phase role of a pod, parsed once at event entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodRole {
    /// Legacy alias for the plan phase.
    Table,
    /// Plan phase: generate DDL without applying it.
    Plan,
    /// Legacy alias for the apply phase.
    Migrate,
    /// Apply phase: execute previously approved DDL.
    Apply,
}

impl PodRole {
    /// Parse a role label value. Unrecognized values yield `None`,
    /// which callers treat as "not a phase pod".
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "table" => Some(Self::Table),
            "plan" => Some(Self::Plan),
            "migrate" => Some(Self::Migrate),
            "apply" => Some(Self::Apply),
            _ => None,
        }
    }

    /// The label value for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Plan => "plan",
            Self::Migrate => "migrate",
            Self::Apply => "apply",
        }
    }
}

impl Pod {
    /// Parse this pod's role label, if present and recognized.
    pub fn role(&self) -> Option<PodRole> {
        self.label(ROLE_LABEL).and_then(PodRole::parse)
    }
}
