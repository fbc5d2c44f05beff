use ceq_exec::ExecError;
use ceq_model::{ModelError, StepIndex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no runner for step kind: {0}")]
    NoRunner(String),
    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Exec(ExecError),
    #[error("verification failed: {0}")]
    Verification(String),
    #[error("step {index} ({step}) failed: {reason}")]
    StepFailed {
        index: StepIndex,
        step: String,
        reason: String,
    },
    #[error("canceled")]
    Canceled,
}

impl From<ExecError> for CoreError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Cancelled => CoreError::Canceled,
            other => CoreError::Exec(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid step: {0}")]
    InvalidSpec(String),
    #[error("runner {runner} does not handle {kind}")]
    Unsupported {
        runner: &'static str,
        kind: &'static str,
    },
}
