use serde::{Deserialize, Serialize};

use crate::{DurationMs, RunId, StepIndex};

/// Kind of a pipeline lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    PlanStarted,
    PlanFinished,
    PlanAborted,

    StepStarting,
    StepSkipped,
    StepSucceeded,
    StepFailed,
    StepCanceled,
}

/// Pipeline lifecycle event delivered to subscribers.
///
/// Optional fields are filled only for the kinds they make sense for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub kind: EventKind,
    pub run: RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<StepIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<DurationMs>,
}

impl Event {
    pub fn new(kind: EventKind, run: RunId) -> Self {
        Self {
            kind,
            run,
            plan: None,
            step: None,
            index: None,
            reason: None,
            elapsed_ms: None,
        }
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    pub fn with_step(mut self, index: StepIndex, step: impl Into<String>) -> Self {
        self.index = Some(index);
        self.step = Some(step.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: DurationMs) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }
}
