use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{CommandOutput, CommandSpec, ExecError, ExecResult, Executor};

type Matcher = Box<dyn Fn(&CommandSpec) -> bool + Send + Sync>;

/// Executor that never spawns anything.
///
/// Every command is recorded; the reply is the first scripted reply whose matcher accepts the command,
/// or a successful empty output. Backs `--dry-run` and process-free tests.
pub struct RecordingExecutor {
    calls: Mutex<Vec<CommandSpec>>,
    replies: Vec<(Matcher, CommandOutput)>,
    echo: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Vec::new(),
            echo: false,
        }
    }

    /// Log every recorded command line at info level.
    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn reply<F>(mut self, matcher: F, output: CommandOutput) -> Self
    where
        F: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
    {
        self.replies.push((Box::new(matcher), output));
        self
    }

    /// Reply for commands whose rendered line starts with `prefix`.
    pub fn reply_prefix(self, prefix: &str, output: CommandOutput) -> Self {
        let prefix = prefix.to_string();
        self.reply(move |cmd| cmd.render().starts_with(&prefix), output)
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered command lines in call order.
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::render).collect()
    }
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    fn name(&self) -> &'static str {
        "record"
    }

    async fn run(&self, cmd: &CommandSpec, cancel: &CancellationToken) -> ExecResult<CommandOutput> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        if cmd.program.is_empty() {
            return Err(ExecError::MissingProgram);
        }
        if self.echo {
            info!(target: "ceq.exec.record", "{}", cmd.render());
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cmd.clone());

        let output = self
            .replies
            .iter()
            .find(|(matcher, _)| matcher(cmd))
            .map(|(_, out)| out.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));

        match output.code {
            Some(code) if code != 0 && cmd.fail_on_non_zero => Err(ExecError::NonZeroExit {
                program: cmd.program.clone(),
                code,
                detail: output.stderr_tail().to_string(),
            }),
            _ => Ok(output),
        }
    }
}
