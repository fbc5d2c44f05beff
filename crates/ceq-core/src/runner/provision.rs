use std::sync::Arc;

use ceq_exec::CommandSpec;
use ceq_model::{ClusterSpec, InstanceSpec, Resource, StepSpec};

use crate::{
    error::RunnerError,
    runner::{BuildContext, Runner, require, unsupported},
    step::{CommandStep, Probe, StepRef},
};

/// Creates and deletes instances and clusters through `gcloud`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProvisionRunner;

impl ProvisionRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for ProvisionRunner {
    fn name(&self) -> &'static str {
        "provision"
    }

    fn supports(&self, spec: &StepSpec) -> bool {
        matches!(spec, StepSpec::Provision { .. } | StepSpec::Teardown { .. })
    }

    fn build_step(&self, spec: &StepSpec, ctx: &BuildContext) -> Result<StepRef, RunnerError> {
        let step = match spec {
            StepSpec::Provision { resource } => {
                validate(resource)?;
                CommandStep::new(format!("provision {}", resource.id()))
                    .probe(Probe::SatisfiedWhenOk(describe(resource, ctx)))
                    .command(create(resource, ctx))
            }
            StepSpec::Teardown { resource } => {
                validate(resource)?;
                CommandStep::new(format!("teardown {}", resource.id()))
                    .probe(Probe::SatisfiedWhenFails(describe(resource, ctx)))
                    .command(delete(resource, ctx))
            }
            other => return Err(unsupported(self.name(), other)),
        };
        Ok(Arc::new(step.with_env(&ctx.env)))
    }
}

fn validate(resource: &Resource) -> Result<(), RunnerError> {
    match resource {
        Resource::Instance(i) => {
            require(&i.name, "instance name")?;
            require(&i.zone, "instance zone")?;
            require(&i.machine_type, "machine type")
        }
        Resource::Cluster(c) => {
            require(&c.name, "cluster name")?;
            require(&c.region, "cluster region")?;
            require(&c.master_machine_type, "master machine type")
        }
    }
}

fn instances(verb: &str, spec: &InstanceSpec) -> CommandSpec {
    CommandSpec::new("gcloud")
        .args(["compute", "instances", verb])
        .arg(&spec.name)
        .arg(format!("--zone={}", spec.zone))
}

fn clusters(verb: &str, spec: &ClusterSpec) -> CommandSpec {
    CommandSpec::new("gcloud")
        .args(["dataproc", "clusters", verb])
        .arg(&spec.name)
        .arg(format!("--region={}", spec.region))
}

/// Creation request; keyed on the same name and location as [`delete`].
pub fn create(resource: &Resource, ctx: &BuildContext) -> CommandSpec {
    match resource {
        Resource::Instance(spec) => {
            let cmd = instances("create", spec)
                .arg(format!("--machine-type={}", spec.machine_type))
                .arg(format!("--image-family={}", spec.image_family))
                .arg(format!("--image-project={}", spec.image_project))
                .arg(format!("--boot-disk-size={}GB", spec.boot_disk_gb));
            ctx.project_flag(cmd)
        }
        Resource::Cluster(spec) => {
            let mut cmd = clusters("create", spec)
                .opt_flag("--zone", spec.zone.as_deref())
                .arg(format!("--master-machine-type={}", spec.master_machine_type));
            cmd = if spec.num_workers == 0 {
                cmd.arg("--single-node")
            } else {
                cmd.arg(format!("--worker-machine-type={}", spec.worker_machine_type))
                    .arg(format!("--num-workers={}", spec.num_workers))
            };
            let idle = spec.max_idle_secs.map(|secs| format!("{secs}s"));
            let cmd = cmd
                .opt_flag("--max-idle", idle.as_deref())
                .opt_flag("--image-version", spec.image_version.as_deref());
            ctx.project_flag(cmd)
        }
    }
}

pub fn delete(resource: &Resource, ctx: &BuildContext) -> CommandSpec {
    let cmd = match resource {
        Resource::Instance(spec) => instances("delete", spec),
        Resource::Cluster(spec) => clusters("delete", spec),
    };
    ctx.project_flag(cmd).arg("--quiet")
}

/// Read-only existence check.
pub fn describe(resource: &Resource, ctx: &BuildContext) -> CommandSpec {
    let cmd = match resource {
        Resource::Instance(spec) => instances("describe", spec),
        Resource::Cluster(spec) => clusters("describe", spec),
    };
    ctx.project_flag(cmd).arg("--format=value(name)")
}
