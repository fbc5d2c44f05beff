use ceq_exec::CommandSpec;
use ceq_model::{Env, StepSpec};

use crate::{error::RunnerError, step::StepRef};

mod collect;
pub use collect::CollectRunner;

mod install;
pub use install::InstallRunner;

mod provision;
pub use provision::ProvisionRunner;

mod submit;
pub use submit::SubmitRunner;

/// Inputs shared by every step built from one plan.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Cloud project passed to provider commands, if any.
    pub project: Option<String>,
    /// Variables exported by earlier steps, applied to later commands.
    pub env: Env,
    /// Search path inherited from the calling process.
    pub path: Option<String>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }

    pub fn with_path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    /// Current value of a `PATH`-like variable: exported value first, then the inherited one.
    pub fn search_path(&self) -> Option<&str> {
        self.env.get("PATH").or(self.path.as_deref())
    }

    /// Append `--project=<id>` when a project is configured.
    pub(crate) fn project_flag(&self, cmd: CommandSpec) -> CommandSpec {
        cmd.opt_flag("--project", self.project.as_deref())
    }
}

/// Turns step specs of the kinds it supports into executable steps.
pub trait Runner: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, spec: &StepSpec) -> bool;

    fn build_step(&self, spec: &StepSpec, ctx: &BuildContext) -> Result<StepRef, RunnerError>;

    /// Variables visible to every step after this one.
    fn exports(&self, _spec: &StepSpec, _ctx: &BuildContext) -> Env {
        Env::new()
    }
}

pub(crate) fn unsupported(runner: &'static str, spec: &StepSpec) -> RunnerError {
    RunnerError::Unsupported {
        runner,
        kind: spec.kind(),
    }
}

pub(crate) fn require(value: &str, what: &str) -> Result<(), RunnerError> {
    if value.trim().is_empty() {
        return Err(RunnerError::InvalidSpec(format!("{what} is empty")));
    }
    Ok(())
}
