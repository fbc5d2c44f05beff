use async_trait::async_trait;
use ceq_exec::CommandSpec;
use ceq_model::Env;

use crate::{
    error::CoreError,
    step::{Step, StepContext},
};

/// Idempotency check made of a single command.
#[derive(Debug, Clone)]
pub enum Probe {
    /// Satisfied when the command exits with success (resource exists, session running).
    SatisfiedWhenOk(CommandSpec),
    /// Satisfied when the command fails (resource already gone).
    SatisfiedWhenFails(CommandSpec),
}

impl Probe {
    fn command_mut(&mut self) -> &mut CommandSpec {
        match self {
            Probe::SatisfiedWhenOk(cmd) | Probe::SatisfiedWhenFails(cmd) => cmd,
        }
    }

    async fn check(&self, ctx: &StepContext) -> Result<bool, CoreError> {
        match self {
            Probe::SatisfiedWhenOk(cmd) => ctx.succeeds(cmd).await,
            Probe::SatisfiedWhenFails(cmd) => Ok(!ctx.succeeds(cmd).await?),
        }
    }
}

/// Step that runs a fixed list of commands in order, stopping at the first failure.
#[derive(Debug, Clone)]
pub struct CommandStep {
    name: String,
    probe: Option<Probe>,
    commands: Vec<CommandSpec>,
}

impl CommandStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probe: None,
            commands: Vec::new(),
        }
    }

    pub fn probe(mut self, probe: Probe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn command(mut self, cmd: CommandSpec) -> Self {
        self.commands.push(cmd);
        self
    }

    /// Run the probe and every command with `env` underneath their own variables.
    pub fn with_env(mut self, env: &Env) -> Self {
        if env.is_empty() {
            return self;
        }
        let cmds = self
            .commands
            .iter_mut()
            .chain(self.probe.as_mut().map(Probe::command_mut));
        for cmd in cmds {
            cmd.env = env.merged(&cmd.env);
        }
        self
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn probe_spec(&self) -> Option<&Probe> {
        self.probe.as_ref()
    }
}

#[async_trait]
impl Step for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, ctx: &StepContext) -> Result<bool, CoreError> {
        match &self.probe {
            Some(p) => p.check(ctx).await,
            None => Ok(false),
        }
    }

    async fn apply(&self, ctx: &StepContext) -> Result<(), CoreError> {
        for cmd in &self.commands {
            ctx.run(cmd).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ceq_exec::{CommandOutput, RecordingExecutor};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::step::StepOutcome;

    fn ctx(exec: Arc<RecordingExecutor>) -> StepContext {
        StepContext::new(exec, CancellationToken::new())
    }

    #[tokio::test]
    async fn satisfied_probe_skips_commands() {
        let exec = Arc::new(RecordingExecutor::new());
        let step = CommandStep::new("venv")
            .probe(Probe::SatisfiedWhenOk(CommandSpec::new("test").args(["-x", "py"])))
            .command(CommandSpec::new("python3").args(["-m", "venv", ".venv"]));

        let outcome = step.execute(&ctx(exec.clone()), true).await.unwrap();
        assert_eq!(outcome, StepOutcome::AlreadySatisfied);
        assert_eq!(exec.lines(), vec!["test -x py"]);
    }

    #[tokio::test]
    async fn failed_probe_runs_commands_in_order() {
        let exec = Arc::new(
            RecordingExecutor::new().reply_prefix("test", CommandOutput::failed(1, "")),
        );
        let step = CommandStep::new("runtime")
            .probe(Probe::SatisfiedWhenOk(CommandSpec::new("test").args(["-d", "bin"])))
            .command(CommandSpec::new("mkdir").args(["-p", "dir"]))
            .command(CommandSpec::new("tar").args(["-xzf", "a.tgz"]));

        let outcome = step.execute(&ctx(exec.clone()), true).await.unwrap();
        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(exec.lines(), vec!["test -d bin", "mkdir -p dir", "tar -xzf a.tgz"]);
    }

    #[tokio::test]
    async fn inverted_probe_for_teardown() {
        let exec = Arc::new(
            RecordingExecutor::new().reply_prefix("describe", CommandOutput::failed(1, "not found")),
        );
        let step = CommandStep::new("delete")
            .probe(Probe::SatisfiedWhenFails(CommandSpec::new("describe")))
            .command(CommandSpec::new("delete"));

        let outcome = step.execute(&ctx(exec.clone()), true).await.unwrap();
        assert_eq!(outcome, StepOutcome::AlreadySatisfied);
    }

    #[tokio::test]
    async fn first_failure_stops_the_step() {
        let exec = Arc::new(
            RecordingExecutor::new().reply_prefix("apt-get update", CommandOutput::failed(100, "E: lock")),
        );
        let step = CommandStep::new("packages")
            .command(CommandSpec::new("apt-get").arg("update"))
            .command(CommandSpec::new("apt-get").args(["install", "-y", "tmux"]));

        let err = step.execute(&ctx(exec.clone()), false).await.unwrap_err();
        assert!(err.to_string().contains("non-zero exit code 100"));
        assert_eq!(exec.calls().len(), 1);
    }

    #[tokio::test]
    async fn exported_env_reaches_probe_and_commands() {
        let exec = Arc::new(
            RecordingExecutor::new().reply_prefix("test", CommandOutput::failed(1, "")),
        );
        let mut own = Env::new();
        own.push("PATH", "/own/bin");
        let mut exported = Env::new();
        exported.push("JAVA_HOME", "/opt/jdk");
        exported.push("PATH", "/opt/jdk/bin:/usr/bin");
        let step = CommandStep::new("venv")
            .probe(Probe::SatisfiedWhenOk(CommandSpec::new("test").args(["-x", "py"])))
            .command(CommandSpec::new("python3").envs(&own))
            .with_env(&exported);

        step.execute(&ctx(exec.clone()), true).await.unwrap();
        let calls = exec.calls();
        assert_eq!(calls[0].env.get("JAVA_HOME"), Some("/opt/jdk"));
        assert_eq!(calls[1].env.get("JAVA_HOME"), Some("/opt/jdk"));
        assert_eq!(calls[1].env.get("PATH"), Some("/own/bin"));
    }
}
