use std::sync::Arc;

use async_trait::async_trait;
use ceq_exec::{CommandOutput, CommandSpec, ExecutorRef};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CoreError;

mod command;
pub use command::{CommandStep, Probe};

mod manifest;
pub use manifest::ManifestStep;

/// Everything a step needs while it runs.
#[derive(Clone)]
pub struct StepContext {
    pub executor: ExecutorRef,
    pub cancel: CancellationToken,
    /// Re-check postconditions after applying.
    pub verify: bool,
}

impl StepContext {
    pub fn new(executor: ExecutorRef, cancel: CancellationToken) -> Self {
        Self {
            executor,
            cancel,
            verify: true,
        }
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Run a command; a non-zero exit is an error unless the command allows failure.
    pub async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, CoreError> {
        debug!(target: "ceq.core.step", cmd = %cmd.render(), "run");
        Ok(self.executor.run(cmd, &self.cancel).await?)
    }

    /// Run a command and report whether it exited with success.
    pub async fn succeeds(&self, cmd: &CommandSpec) -> Result<bool, CoreError> {
        let out = self.run(&cmd.clone().allow_failure()).await?;
        Ok(out.success())
    }
}

/// How a step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// The probe found the postcondition already holding.
    AlreadySatisfied,
}

/// One executable unit of a plan.
///
/// `probe` answers "is the postcondition already true?"; steps without a cheap check keep the default
/// and always apply.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn probe(&self, _ctx: &StepContext) -> Result<bool, CoreError> {
        Ok(false)
    }

    async fn apply(&self, ctx: &StepContext) -> Result<(), CoreError>;

    /// Probe (when enabled) and apply.
    async fn execute(&self, ctx: &StepContext, probe: bool) -> Result<StepOutcome, CoreError> {
        if probe && self.probe(ctx).await? {
            return Ok(StepOutcome::AlreadySatisfied);
        }
        self.apply(ctx).await?;
        Ok(StepOutcome::Applied)
    }
}

pub type StepRef = Arc<dyn Step>;
