use serde::{Deserialize, Serialize};

/// Current execution state of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    /// Step has not started yet.
    Pending,
    /// Step is executing (probe or apply).
    Running,
    /// Step applied successfully.
    Succeeded,
    /// Probe reported the step as already satisfied; nothing was applied.
    Skipped,
    /// Step failed; the run stopped here.
    Failed,
    /// Step was interrupted by cancellation.
    Canceled,
}

impl StepStatus {
    /// Returns `true` if the step won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Skipped | StepStatus::Failed | StepStatus::Canceled
        )
    }

    /// Returns `true` if the step finished without error.
    pub fn is_ok(&self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
            StepStatus::Canceled => "canceled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(StepStatus::Succeeded.is_terminal());
        assert!(StepStatus::Skipped.is_terminal());
        assert!(StepStatus::Failed.is_terminal());
        assert!(StepStatus::Canceled.is_terminal());

        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
    }

    #[test]
    fn ok_states() {
        assert!(StepStatus::Succeeded.is_ok());
        assert!(StepStatus::Skipped.is_ok());
        assert!(!StepStatus::Failed.is_ok());
        assert!(!StepStatus::Pending.is_ok());
    }

    #[test]
    fn serde_camel_case() {
        let json = serde_json::to_string(&StepStatus::Skipped).unwrap();
        assert_eq!(json, r#""skipped""#);

        let back: StepStatus = serde_json::from_str(r#""canceled""#).unwrap();
        assert_eq!(back, StepStatus::Canceled);
    }
}
