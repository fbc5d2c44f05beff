use std::sync::Arc;

use ceq_exec::CommandSpec;
use ceq_model::{ArtifactSource, ArtifactSpec, StepSpec};

use crate::{
    error::RunnerError,
    runner::{BuildContext, Runner, require, unsupported},
    step::{CommandStep, StepRef},
};

/// Copies experiment output to a local directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectRunner;

impl CollectRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for CollectRunner {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn supports(&self, spec: &StepSpec) -> bool {
        matches!(spec, StepSpec::Collect { .. })
    }

    fn build_step(&self, spec: &StepSpec, ctx: &BuildContext) -> Result<StepRef, RunnerError> {
        let StepSpec::Collect { artifact } = spec else {
            return Err(unsupported(self.name(), spec));
        };
        let dest = artifact.destination.display().to_string();
        require(&dest, "destination")?;

        let step = CommandStep::new(format!("collect {}", source_label(artifact)))
            .command(CommandSpec::new("mkdir").arg("-p").arg(&dest))
            .command(copy(artifact, ctx)?)
            .with_env(&ctx.env);
        Ok(Arc::new(step))
    }
}

fn source_label(artifact: &ArtifactSpec) -> String {
    match &artifact.source {
        ArtifactSource::Bucket { uri } => uri.clone(),
        ArtifactSource::Instance { name, path, .. } => format!("{name}:{path}"),
    }
}

pub fn copy(artifact: &ArtifactSpec, ctx: &BuildContext) -> Result<CommandSpec, RunnerError> {
    let dest = artifact.destination.display().to_string();
    match &artifact.source {
        ArtifactSource::Bucket { uri } => {
            if !uri.starts_with("gs://") {
                return Err(RunnerError::InvalidSpec(format!(
                    "not an object-storage uri: {uri}"
                )));
            }
            Ok(CommandSpec::new("gsutil")
                .args(["-m", "cp", "-r"])
                .arg(uri)
                .arg(dest))
        }
        ArtifactSource::Instance { name, zone, path } => {
            require(name, "instance name")?;
            require(path, "remote path")?;
            let cmd = CommandSpec::new("gcloud")
                .args(["compute", "scp", "--recurse"])
                .arg(format!("{name}:{path}"))
                .arg(dest)
                .arg(format!("--zone={zone}"));
            Ok(ctx.project_flag(cmd))
        }
    }
}
