use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{CommandOutput, CommandSpec, ExecResult};

/// Runs fully resolved commands.
///
/// Implementations must honour `fail_on_non_zero` and stop the command when `cancel` fires.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, cmd: &CommandSpec, cancel: &CancellationToken) -> ExecResult<CommandOutput>;
}

pub type ExecutorRef = Arc<dyn Executor>;
