use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{StepIndex, StepStatus};

/// Snapshot of a single step within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInfo {
    pub index: StepIndex,
    /// Human-readable step name, e.g. `provision instance/ceq-instance`.
    pub name: String,
    /// Short step kind, see [`crate::StepSpec::kind`].
    pub kind: String,
    pub status: StepStatus,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
