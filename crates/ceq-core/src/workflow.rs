//! Plans for the standard experiment workflows, derived from [`Settings`].

use std::path::{Path, PathBuf};

use ceq_model::{
    ArtifactSource, ArtifactSpec, Job, JobSpec, Launch, LocalMode, MarketJob, ModelVariant, Plan,
    Program, Resource, StepSpec,
};

use crate::{config::Settings, error::CoreError, runner::BuildContext};

/// Build context for provider and install commands.
pub fn context(s: &Settings) -> BuildContext {
    BuildContext::new()
        .with_project(s.project.clone())
        .with_path(s.path.clone())
}

/// Build context for plans that start programs outside a setup plan.
///
/// Carries the runtime variables a previous setup would have exported.
pub fn session_context(s: &Settings) -> BuildContext {
    context(s).with_env(s.session_env())
}

pub fn instance_up(s: &Settings) -> Plan {
    Plan::new("instance-up").step(StepSpec::Provision {
        resource: Resource::Instance(s.instance_spec()),
    })
}

pub fn instance_down(s: &Settings) -> Plan {
    Plan::new("instance-down").step(StepSpec::Teardown {
        resource: Resource::Instance(s.instance_spec()),
    })
}

pub fn cluster_up(s: &Settings) -> Plan {
    Plan::new("cluster-up").step(StepSpec::Provision {
        resource: Resource::Cluster(s.cluster_spec()),
    })
}

pub fn cluster_down(s: &Settings) -> Plan {
    Plan::new("cluster-down").step(StepSpec::Teardown {
        resource: Resource::Cluster(s.cluster_spec()),
    })
}

/// Packages, runtime, virtual environment and pinned manifest, in that order.
pub fn setup(s: &Settings) -> Plan {
    Plan::new("setup")
        .step(StepSpec::SystemPackages {
            packages: s.packages.clone(),
            sudo: true,
        })
        .step(StepSpec::Runtime {
            archive: s.runtime.clone(),
        })
        .step(StepSpec::VirtualEnv {
            path: s.venv.clone(),
        })
        .step(StepSpec::Manifest {
            venv: s.venv.clone(),
            manifest: s.manifest.clone(),
        })
}

/// Value-model generation for `variant` in a detached local session.
pub fn run_local(
    s: &Settings,
    variant: ModelVariant,
    mode: LocalMode,
    session: Option<String>,
) -> Plan {
    let session = session
        .unwrap_or_else(|| format!("value-models-{}", variant.as_str().to_lowercase()));
    let log = matches!(mode, LocalMode::Nohup).then(|| s.workdir.join(format!("{session}.log")));
    Plan::new("run").step(StepSpec::Submit {
        job: JobSpec {
            job: Job::ValueModels {
                variant,
                output_dir: s.output_dir.clone(),
            },
            launch: Launch::Local {
                session,
                mode,
                python: s.python(),
                workdir: Some(s.workdir.clone()),
                log,
            },
        },
    })
}

/// Where the program script and its bundle are read from.
#[derive(Debug, Clone, Default)]
pub struct CodeSource {
    /// Local directory holding the program script; uploaded before submission when set.
    pub code_dir: Option<PathBuf>,
    /// Local zip of helper modules; uploaded and passed with the job when set.
    pub bundle: Option<PathBuf>,
}

/// Market generation or experiments on the managed cluster.
pub fn submit_remote(
    s: &Settings,
    program: Program,
    variant: ModelVariant,
    dim1: u32,
    dim2: u32,
    code: CodeSource,
) -> Result<Plan, CoreError> {
    let job = Job::market(
        program,
        MarketJob {
            variant: variant.to_string(),
            input: s.bucket_uri(&s.input_prefix)?,
            output: s.bucket_uri(&s.output_prefix)?,
            dim1,
            dim2,
        },
    )?;
    let script = program.script();
    let main_uri = s.bucket_uri(&format!("code/{script}"))?;

    let mut plan = Plan::new(format!("submit-{}", program.as_str()));
    if let Some(dir) = &code.code_dir {
        plan = plan.step(StepSpec::UploadBundle {
            local: dir.join(script),
            uri: main_uri.clone(),
        });
    }
    let bundle_uri = match &code.bundle {
        Some(local) => {
            let uri = s.bucket_uri(&format!("code/{}", file_name(local)?))?;
            plan = plan.step(StepSpec::UploadBundle {
                local: local.clone(),
                uri: uri.clone(),
            });
            Some(uri)
        }
        None => None,
    };

    Ok(plan.step(StepSpec::Submit {
        job: JobSpec {
            job,
            launch: Launch::Remote {
                cluster: s.cluster.clone(),
                region: s.region.clone(),
                main_uri,
                bundle_uri,
            },
        },
    }))
}

fn file_name(path: &Path) -> Result<String, CoreError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CoreError::Config(format!("bundle has no file name: {}", path.display())))
}

/// Copy results to `dest`, from the instance's output directory or the bucket's output prefix.
pub fn collect(s: &Settings, from_instance: bool, dest: PathBuf) -> Result<Plan, CoreError> {
    let source = if from_instance {
        ArtifactSource::Instance {
            name: s.instance.clone(),
            zone: s.zone.clone(),
            path: s.workdir.join(&s.output_dir).display().to_string(),
        }
    } else {
        ArtifactSource::Bucket {
            uri: s.bucket_uri(&s.output_prefix)?,
        }
    };
    Ok(Plan::new("collect").step(StepSpec::Collect {
        artifact: ArtifactSpec {
            source,
            destination: dest,
        },
    }))
}
