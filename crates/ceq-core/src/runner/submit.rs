use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ceq_exec::{CommandSpec, util::shell_quote};
use ceq_model::{Env, Job, JobSpec, Launch, LocalMode, StepSpec};

use crate::{
    error::RunnerError,
    runner::{BuildContext, Runner, require, unsupported},
    step::{CommandStep, Probe, StepRef},
};

/// Code bundle upload and job launch, locally or on a cluster.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubmitRunner;

impl SubmitRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for SubmitRunner {
    fn name(&self) -> &'static str {
        "submit"
    }

    fn supports(&self, spec: &StepSpec) -> bool {
        matches!(spec, StepSpec::UploadBundle { .. } | StepSpec::Submit { .. })
    }

    fn build_step(&self, spec: &StepSpec, ctx: &BuildContext) -> Result<StepRef, RunnerError> {
        match spec {
            StepSpec::UploadBundle { local, uri } => {
                require_bucket_uri(uri)?;
                Ok(Arc::new(
                    CommandStep::new(format!("upload-bundle {uri}"))
                        .command(upload(local, uri))
                        .with_env(&ctx.env),
                ))
            }
            StepSpec::Submit { job } => {
                job.job
                    .validate()
                    .map_err(|e| RunnerError::InvalidSpec(e.to_string()))?;
                Ok(Arc::new(submit_step(job, ctx)?.with_env(&ctx.env)))
            }
            other => Err(unsupported(self.name(), other)),
        }
    }
}

fn require_bucket_uri(uri: &str) -> Result<(), RunnerError> {
    if !uri.starts_with("gs://") {
        return Err(RunnerError::InvalidSpec(format!(
            "not an object-storage uri: {uri}"
        )));
    }
    Ok(())
}

pub fn upload(local: &Path, uri: &str) -> CommandSpec {
    CommandSpec::new("gsutil")
        .arg("cp")
        .arg(local.display().to_string())
        .arg(uri)
}

fn submit_step(spec: &JobSpec, ctx: &BuildContext) -> Result<CommandStep, RunnerError> {
    let job = &spec.job;
    let program = job.program().as_str();
    match &spec.launch {
        Launch::Local {
            session,
            mode,
            python,
            workdir,
            log,
        } => {
            require(session, "session name")?;
            require(python, "interpreter")?;
            let line = job_line(python, job, &ctx.env);
            let name = format!("submit {program} local:{session}");
            match mode {
                LocalMode::Tmux => Ok(CommandStep::new(name)
                    .probe(Probe::SatisfiedWhenOk(
                        CommandSpec::new("tmux")
                            .args(["has-session", "-t"])
                            .arg(format!("={session}")),
                    ))
                    .command(tmux(session, workdir.as_deref(), line))),
                LocalMode::Nohup => {
                    let log = log
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(format!("{session}.log")));
                    Ok(CommandStep::new(name).command(nohup(workdir.as_deref(), &line, &log)))
                }
            }
        }
        Launch::Remote {
            cluster,
            region,
            main_uri,
            bundle_uri,
        } => {
            require(cluster, "cluster name")?;
            require(region, "region")?;
            require_bucket_uri(main_uri)?;
            if let Some(uri) = bundle_uri {
                require_bucket_uri(uri)?;
            }
            Ok(
                CommandStep::new(format!("submit {program} cluster:{cluster}")).command(remote(
                    job,
                    cluster,
                    region,
                    main_uri,
                    bundle_uri.as_deref(),
                    ctx,
                )),
            )
        }
    }
}

/// `[env K=V ...] <python> <script> <argv...>`, shell-quoted.
pub fn job_line(python: &str, job: &Job, env: &Env) -> String {
    let mut words = Vec::new();
    let vars = env.resolved();
    if !vars.is_empty() {
        words.push("env".to_string());
        words.extend(vars.iter().map(|(k, v)| format!("{k}={v}")));
    }
    words.push(python.to_string());
    words.push(job.program().script().to_string());
    words.extend(job.argv());
    words
        .iter()
        .map(|w| shell_quote(w))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn tmux(session: &str, workdir: Option<&Path>, line: String) -> CommandSpec {
    let cmd = CommandSpec::new("tmux").args(["new-session", "-d", "-s"]).arg(session);
    let cmd = match workdir {
        Some(dir) => cmd.arg("-c").arg(dir.display().to_string()),
        None => cmd,
    };
    cmd.arg(line)
}

pub fn nohup(workdir: Option<&Path>, line: &str, log: &Path) -> CommandSpec {
    let run = format!(
        "nohup {line} > {} 2>&1 &",
        shell_quote(&log.display().to_string())
    );
    let script = match workdir {
        Some(dir) => format!("cd {} && {run}", shell_quote(&dir.display().to_string())),
        None => run,
    };
    CommandSpec::shell(script)
}

pub fn remote(
    job: &Job,
    cluster: &str,
    region: &str,
    main_uri: &str,
    bundle_uri: Option<&str>,
    ctx: &BuildContext,
) -> CommandSpec {
    let cmd = CommandSpec::new("gcloud")
        .args(["dataproc", "jobs", "submit", "pyspark"])
        .arg(main_uri)
        .arg(format!("--cluster={cluster}"))
        .arg(format!("--region={region}"));
    ctx.project_flag(cmd)
        .opt_flag("--py-files", bundle_uri)
        .arg("--async")
        .arg("--")
        .args(job.argv())
}
