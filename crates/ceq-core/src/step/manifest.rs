use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ceq_exec::CommandSpec;
use ceq_model::{Drift, Env, Manifest};
use tracing::{debug, warn};

use crate::{
    error::CoreError,
    step::{Step, StepContext},
};

/// Installs a pinned manifest into a virtual environment and checks the installed versions.
pub struct ManifestStep {
    name: String,
    venv: PathBuf,
    manifest: Manifest,
    env: Env,
}

impl ManifestStep {
    pub fn new(name: impl Into<String>, venv: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Self {
            name: name.into(),
            venv: venv.into(),
            manifest,
            env: Env::new(),
        }
    }

    pub fn with_env(mut self, env: &Env) -> Self {
        self.env = env.clone();
        self
    }

    fn pip(&self) -> CommandSpec {
        CommandSpec::new(bin(&self.venv, "pip")).envs(&self.env)
    }

    pub fn install_command(&self) -> CommandSpec {
        self.pip()
            .args(["install", "--no-input"])
            .args(self.manifest.to_args())
    }

    pub fn freeze_command(&self) -> CommandSpec {
        self.pip().arg("freeze").allow_failure()
    }

    async fn drift(&self, ctx: &StepContext) -> Result<Option<Vec<Drift>>, CoreError> {
        let out = ctx.run(&self.freeze_command()).await?;
        if !out.success() {
            // No environment yet.
            return Ok(None);
        }
        Ok(Some(self.manifest.drift(&out.stdout)))
    }
}

fn bin(venv: &Path, tool: &str) -> String {
    venv.join("bin").join(tool).display().to_string()
}

fn describe(drift: &[Drift]) -> String {
    drift
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl Step for ManifestStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, ctx: &StepContext) -> Result<bool, CoreError> {
        match self.drift(ctx).await? {
            Some(drift) if drift.is_empty() => Ok(true),
            Some(drift) => {
                debug!(venv = %self.venv.display(), drift = %describe(&drift), "manifest not satisfied");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn apply(&self, ctx: &StepContext) -> Result<(), CoreError> {
        if self.manifest.is_empty() {
            return Ok(());
        }
        ctx.run(&self.install_command()).await?;

        if !ctx.verify {
            return Ok(());
        }
        match self.drift(ctx).await? {
            Some(drift) if drift.is_empty() => Ok(()),
            Some(drift) => {
                let detail = describe(&drift);
                warn!(venv = %self.venv.display(), drift = %detail, "installed versions differ from manifest");
                Err(CoreError::Verification(format!("version drift: {detail}")))
            }
            None => Err(CoreError::Verification(format!(
                "cannot list packages in {}",
                self.venv.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ceq_exec::{CommandOutput, RecordingExecutor};
    use ceq_model::Pin;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::step::StepOutcome;

    fn step() -> ManifestStep {
        ManifestStep::new(
            "manifest",
            "/srv/.venv",
            Manifest(vec![Pin::new("pulp", "2.4"), Pin::new("numpy", "1.19.5")]),
        )
    }

    fn ctx(exec: Arc<RecordingExecutor>) -> StepContext {
        StepContext::new(exec, CancellationToken::new())
    }

    #[tokio::test]
    async fn matching_freeze_skips_install() {
        let exec = Arc::new(RecordingExecutor::new().reply_prefix(
            "/srv/.venv/bin/pip freeze",
            CommandOutput::ok("PuLP==2.4\nnumpy==1.19.5\n"),
        ));
        let outcome = step().execute(&ctx(exec.clone()), true).await.unwrap();
        assert_eq!(outcome, StepOutcome::AlreadySatisfied);
        assert_eq!(exec.calls().len(), 1);
    }

    #[tokio::test]
    async fn drift_after_install_fails_verification() {
        let exec = Arc::new(RecordingExecutor::new().reply_prefix(
            "/srv/.venv/bin/pip freeze",
            CommandOutput::ok("pulp==2.5\nnumpy==1.19.5\n"),
        ));
        let err = step().execute(&ctx(exec.clone()), true).await.unwrap_err();
        match err {
            CoreError::Verification(msg) => assert!(msg.contains("pulp"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            exec.lines()[1],
            "/srv/.venv/bin/pip install --no-input pulp==2.4 numpy==1.19.5"
        );
    }

    #[tokio::test]
    async fn verification_can_be_disabled() {
        let exec = Arc::new(RecordingExecutor::new());
        let ctx = ctx(exec.clone()).with_verify(false);
        let outcome = step().execute(&ctx, false).await.unwrap();
        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(exec.calls().len(), 1);
    }
}
