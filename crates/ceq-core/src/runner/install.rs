use std::{path::Path, sync::Arc};

use ceq_exec::CommandSpec;
use ceq_model::{Env, RuntimeArchive, StepSpec};

use crate::{
    config::runtime_exports,
    error::RunnerError,
    runner::{BuildContext, Runner, unsupported},
    step::{CommandStep, ManifestStep, Probe, StepRef},
};

/// System packages, the language runtime, the isolated environment and the pinned manifest.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstallRunner;

impl InstallRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for InstallRunner {
    fn name(&self) -> &'static str {
        "install"
    }

    fn supports(&self, spec: &StepSpec) -> bool {
        matches!(
            spec,
            StepSpec::SystemPackages { .. }
                | StepSpec::Runtime { .. }
                | StepSpec::VirtualEnv { .. }
                | StepSpec::Manifest { .. }
        )
    }

    fn build_step(&self, spec: &StepSpec, ctx: &BuildContext) -> Result<StepRef, RunnerError> {
        let env = &ctx.env;
        match spec {
            StepSpec::SystemPackages { packages, sudo } => {
                Ok(Arc::new(system_packages(packages, *sudo)?.with_env(env)))
            }
            StepSpec::Runtime { archive } => Ok(Arc::new(runtime(archive)?.with_env(env))),
            StepSpec::VirtualEnv { path } => Ok(Arc::new(virtual_env(path).with_env(env))),
            StepSpec::Manifest { venv, manifest } => Ok(Arc::new(
                ManifestStep::new(
                    format!("manifest {}", venv.display()),
                    venv.clone(),
                    manifest.clone(),
                )
                .with_env(env),
            )),
            other => Err(unsupported(self.name(), other)),
        }
    }

    fn exports(&self, spec: &StepSpec, ctx: &BuildContext) -> Env {
        match spec {
            StepSpec::Runtime { archive } => {
                runtime_exports(archive, &Env::new(), ctx.search_path())
            }
            StepSpec::VirtualEnv { path } => {
                let mut env = Env::single("VIRTUAL_ENV", path.display().to_string());
                env.prepend_path(
                    "PATH",
                    &path.join("bin").display().to_string(),
                    ctx.search_path(),
                );
                env
            }
            _ => Env::new(),
        }
    }
}

fn apt_get(sudo: bool) -> CommandSpec {
    if sudo {
        CommandSpec::new("sudo").arg("apt-get")
    } else {
        CommandSpec::new("apt-get")
    }
}

fn system_packages(packages: &[String], sudo: bool) -> Result<CommandStep, RunnerError> {
    if packages.is_empty() || packages.iter().any(|p| p.trim().is_empty()) {
        return Err(RunnerError::InvalidSpec("empty package list".into()));
    }
    Ok(CommandStep::new(format!("system-packages {}", packages.join(",")))
        .probe(Probe::SatisfiedWhenOk(
            CommandSpec::new("dpkg").arg("-s").args(packages.iter().cloned()),
        ))
        .command(apt_get(sudo).arg("update"))
        .command(
            apt_get(sudo)
                .args(["install", "-y", "--no-install-recommends"])
                .args(packages.iter().cloned()),
        ))
}

fn runtime(archive: &RuntimeArchive) -> Result<CommandStep, RunnerError> {
    if archive.url.trim().is_empty() {
        return Err(RunnerError::InvalidSpec("runtime url is empty".into()));
    }
    let install_dir = archive.install_dir.display().to_string();
    let tarball = archive.archive.display().to_string();
    Ok(CommandStep::new(format!("runtime {install_dir}"))
        .probe(Probe::SatisfiedWhenOk(
            CommandSpec::new("test")
                .arg("-d")
                .arg(archive.bin_dir().display().to_string()),
        ))
        .command(
            CommandSpec::new("wget")
                .args(["-q", "-O"])
                .arg(&tarball)
                .arg(&archive.url),
        )
        .command(CommandSpec::new("mkdir").arg("-p").arg(&install_dir))
        .command(
            CommandSpec::new("tar")
                .arg("-xzf")
                .arg(&tarball)
                .arg("-C")
                .arg(&install_dir)
                .arg("--strip-components=1"),
        ))
}

fn virtual_env(path: &Path) -> CommandStep {
    let dir = path.display().to_string();
    CommandStep::new(format!("virtual-env {dir}"))
        .probe(Probe::SatisfiedWhenOk(
            CommandSpec::new("test")
                .arg("-x")
                .arg(path.join("bin/python").display().to_string()),
        ))
        .command(CommandSpec::new("python3").args(["-m", "venv"]).arg(dir))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn archive() -> RuntimeArchive {
        RuntimeArchive {
            url: "https://example.org/jdk.tar.gz".into(),
            archive: PathBuf::from("/tmp/jdk.tar.gz"),
            install_dir: PathBuf::from("/opt/jdk-11"),
            home_var: "JAVA_HOME".into(),
        }
    }

    #[test]
    fn packages_probe_and_install() {
        let step = system_packages(&["tmux".into(), "wget".into()], true).unwrap();
        let lines: Vec<_> = step.commands().iter().map(CommandSpec::render).collect();
        assert_eq!(
            lines,
            vec![
                "sudo apt-get update",
                "sudo apt-get install -y --no-install-recommends tmux wget",
            ]
        );
        match step.probe_spec() {
            Some(Probe::SatisfiedWhenOk(cmd)) => assert_eq!(cmd.render(), "dpkg -s tmux wget"),
            other => panic!("unexpected probe {other:?}"),
        }
    }

    #[test]
    fn empty_package_list_is_rejected() {
        assert!(system_packages(&[], false).is_err());
    }

    #[test]
    fn runtime_downloads_then_unpacks() {
        let step = runtime(&archive()).unwrap();
        let lines: Vec<_> = step.commands().iter().map(CommandSpec::render).collect();
        assert_eq!(
            lines,
            vec![
                "wget -q -O /tmp/jdk.tar.gz https://example.org/jdk.tar.gz",
                "mkdir -p /opt/jdk-11",
                "tar -xzf /tmp/jdk.tar.gz -C /opt/jdk-11 --strip-components=1",
            ]
        );
    }

    #[test]
    fn runtime_exports_home_and_path() {
        let ctx = BuildContext::new().with_path(Some("/usr/bin".into()));
        let env = InstallRunner::new().exports(&StepSpec::Runtime { archive: archive() }, &ctx);
        assert_eq!(env.get("JAVA_HOME"), Some("/opt/jdk-11"));
        assert_eq!(env.get("PATH"), Some("/opt/jdk-11/bin:/usr/bin"));
    }

    #[test]
    fn venv_exports_stack_on_earlier_path() {
        let ctx = BuildContext::new().with_env(Env::single("PATH", "/opt/jdk-11/bin:/usr/bin"));
        let env = InstallRunner::new().exports(
            &StepSpec::VirtualEnv {
                path: PathBuf::from("/srv/.venv"),
            },
            &ctx,
        );
        assert_eq!(env.get("VIRTUAL_ENV"), Some("/srv/.venv"));
        assert_eq!(env.get("PATH"), Some("/srv/.venv/bin:/opt/jdk-11/bin:/usr/bin"));
    }

    #[test]
    fn venv_command() {
        let step = virtual_env(Path::new(".venv"));
        assert_eq!(step.commands()[0].render(), "python3 -m venv .venv");
    }
}
