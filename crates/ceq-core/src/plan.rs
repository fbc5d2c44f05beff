//! Plan files and structural validation.

use std::{collections::HashSet, path::Path};

use ceq_model::{Plan, ResourceId, StepSpec};
use tracing::debug;

use crate::error::CoreError;

/// Read a JSON plan from disk and validate it.
pub async fn load(path: impl AsRef<Path>) -> Result<Plan, CoreError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::InvalidPlan(format!("{}: {e}", path.display())))?;
    let plan = parse(&text)?;
    validate(&plan)?;
    Ok(plan)
}

pub fn parse(text: &str) -> Result<Plan, CoreError> {
    serde_json::from_str(text).map_err(|e| CoreError::InvalidPlan(e.to_string()))
}

/// Check resource ordering.
///
/// A resource may be torn down only after the plan provisioned it, and may not be provisioned twice
/// while live. Tearing down a resource the plan never creates is allowed (cleanup plans).
pub fn validate(plan: &Plan) -> Result<(), CoreError> {
    if plan.is_empty() {
        return Err(CoreError::InvalidPlan(format!("plan {} has no steps", plan.name)));
    }

    let provisioned: HashSet<ResourceId> = plan
        .steps
        .iter()
        .filter_map(|s| match s {
            StepSpec::Provision { resource } => Some(resource.id()),
            _ => None,
        })
        .collect();

    let mut live: HashSet<ResourceId> = HashSet::new();
    let mut gone: HashSet<ResourceId> = HashSet::new();

    for (index, step) in plan.steps.iter().enumerate() {
        match step {
            StepSpec::Provision { resource } => {
                let id = resource.id();
                if !live.insert(id.clone()) {
                    return Err(CoreError::InvalidPlan(format!(
                        "step {index}: {id} is provisioned twice"
                    )));
                }
                gone.remove(&id);
            }
            StepSpec::Teardown { resource } => {
                let id = resource.id();
                if live.remove(&id) {
                    gone.insert(id);
                } else if gone.contains(&id) {
                    return Err(CoreError::InvalidPlan(format!(
                        "step {index}: {id} is torn down twice"
                    )));
                } else if provisioned.contains(&id) {
                    return Err(CoreError::InvalidPlan(format!(
                        "step {index}: {id} is torn down before it is provisioned"
                    )));
                } else {
                    gone.insert(id);
                }
            }
            _ => {}
        }
    }

    for id in &live {
        debug!(plan = %plan.name, resource = %id, "resource left running after plan");
    }
    Ok(())
}
