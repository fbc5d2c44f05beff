//! Command-line surface of `ceqctl`.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use ceq_core::{
    BuildContext, CoreError, Pipeline, RunReport, RunnerRouter, Settings, Subscribe, plan,
    workflow::{self, CodeSource},
};
use ceq_exec::{ExecutorRef, ProcExecutor, RecordingExecutor};
use ceq_model::{LocalMode, ModelVariant, Plan, Program, StepStatus};
use ceq_observe::Journal;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Provision cloud machines and run the market experiments on them.
#[derive(Parser, Debug)]
#[command(name = "ceqctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Apply every step without checking whether it is already satisfied
    #[arg(long, global = true)]
    pub no_probe: bool,

    /// Log filter directives
    #[arg(long, global = true, env = "CEQ_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format: text, json or journald
    #[arg(long, global = true, env = "CEQ_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Read variables from this file instead of `./.env`
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Pin the libraries listed in this requirements file instead of the built-in set
    #[arg(long, global = true, env = "CEQ_REQUIREMENTS")]
    pub requirements: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Workflow(Workflow),
    /// Run a JSON plan file
    Plan {
        file: PathBuf,
    },
    /// Print the plan a workflow would run, as JSON
    Show {
        #[command(subcommand)]
        workflow: Workflow,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum Workflow {
    /// Create or delete the experiment VM
    Instance {
        #[command(subcommand)]
        action: Action,
    },
    /// Create or delete the managed cluster
    Cluster {
        #[command(subcommand)]
        action: Action,
    },
    /// Install packages, runtime, virtual environment and pinned libraries
    Setup,
    /// Generate value models locally in a detached session
    Run(RunArgs),
    /// Submit a market job to the cluster
    Submit(SubmitArgs),
    /// Copy results to a local directory
    Collect(CollectArgs),
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Tmux,
    Nohup,
}

impl From<Mode> for LocalMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Tmux => LocalMode::Tmux,
            Mode::Nohup => LocalMode::Nohup,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// LSVM, LSVM2 or GSVM
    pub variant: ModelVariant,
    #[arg(long, value_enum, default_value_t = Mode::Tmux)]
    pub mode: Mode,
    /// Session name; derived from the variant when omitted
    #[arg(long)]
    pub session: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketProgram {
    GenerateMarkets,
    Experiments,
}

impl From<MarketProgram> for Program {
    fn from(p: MarketProgram) -> Self {
        match p {
            MarketProgram::GenerateMarkets => Program::GenerateMarkets,
            MarketProgram::Experiments => Program::ExperimentsPyspark,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    #[arg(value_enum)]
    pub program: MarketProgram,
    /// LSVM, LSVM2 or GSVM
    pub variant: ModelVariant,
    pub dim1: u32,
    pub dim2: u32,
    /// Upload the program script from this directory first
    #[arg(long)]
    pub code_dir: Option<PathBuf>,
    /// Upload this zip and ship it with the job
    #[arg(long)]
    pub bundle: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Copy from the instance instead of the bucket
    #[arg(long)]
    pub from_instance: bool,
    #[arg(long, default_value = "results")]
    pub dest: PathBuf,
}

impl Workflow {
    pub fn plan(&self, s: &Settings) -> Result<Plan, CoreError> {
        Ok(match self {
            Workflow::Instance { action: Action::Up } => workflow::instance_up(s),
            Workflow::Instance {
                action: Action::Down,
            } => workflow::instance_down(s),
            Workflow::Cluster { action: Action::Up } => workflow::cluster_up(s),
            Workflow::Cluster {
                action: Action::Down,
            } => workflow::cluster_down(s),
            Workflow::Setup => workflow::setup(s),
            Workflow::Run(args) => {
                workflow::run_local(s, args.variant, args.mode.into(), args.session.clone())
            }
            Workflow::Submit(args) => workflow::submit_remote(
                s,
                args.program.into(),
                args.variant,
                args.dim1,
                args.dim2,
                CodeSource {
                    code_dir: args.code_dir.clone(),
                    bundle: args.bundle.clone(),
                },
            )?,
            Workflow::Collect(args) => {
                workflow::collect(s, args.from_instance, args.dest.clone())?
            }
        })
    }

    /// Local runs need the runtime variables a setup plan exports.
    pub fn context(&self, s: &Settings) -> BuildContext {
        match self {
            Workflow::Run(_) => workflow::session_context(s),
            _ => workflow::context(s),
        }
    }
}

impl Cli {
    pub async fn run(self, settings: Settings) -> anyhow::Result<()> {
        let settings = self.resolve(settings).await?;
        match &self.command {
            Commands::Workflow(w) => {
                let plan = w.plan(&settings)?;
                self.execute(&plan, w.context(&settings)).await
            }
            Commands::Plan { file } => {
                let plan = plan::load(file)
                    .await
                    .with_context(|| format!("loading {}", file.display()))?;
                self.execute(&plan, workflow::context(&settings)).await
            }
            Commands::Show { workflow } => {
                let plan = workflow.plan(&settings)?;
                println!("{}", serde_json::to_string_pretty(&plan)?);
                Ok(())
            }
        }
    }

    async fn resolve(&self, settings: Settings) -> anyhow::Result<Settings> {
        match &self.requirements {
            Some(path) => Ok(settings
                .with_requirements(path)
                .await
                .with_context(|| format!("loading {}", path.display()))?),
            None => Ok(settings),
        }
    }

    fn pipeline(&self, ctx: BuildContext) -> Pipeline {
        let executor: ExecutorRef = if self.dry_run {
            Arc::new(RecordingExecutor::new().echo())
        } else {
            Arc::new(ProcExecutor::new())
        };
        let router = RunnerRouter::with_defaults().with_context(ctx);
        let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Journal::new())];
        let pipeline = Pipeline::new(router, executor).with_subscribers(subscribers);

        if self.dry_run {
            pipeline.dry_run()
        } else if self.no_probe {
            pipeline.without_probes()
        } else {
            pipeline
        }
    }

    async fn execute(&self, plan: &Plan, ctx: BuildContext) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping current step");
                on_signal.cancel();
            }
        });

        let report = self.pipeline(ctx).run(plan, cancel).await?;
        summarize(&report);
        Ok(())
    }
}

fn summarize(report: &RunReport) {
    info!(
        run = %report.run,
        plan = %report.plan,
        applied = report.count(StepStatus::Succeeded),
        skipped = report.count(StepStatus::Skipped),
        "done"
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ceqctl").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    fn settings() -> Settings {
        let map: HashMap<&str, &str> = HashMap::from([("BUCKET_NAME", "ce")]);
        Settings::from_lookup(|k| map.get(k).map(|v| v.to_string())).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_variant_and_mode() {
        let cli = parse(&["run", "GSVM", "--mode", "nohup"]);
        match cli.command {
            Commands::Workflow(Workflow::Run(args)) => {
                assert_eq!(args.variant, ModelVariant::Gsvm);
                assert_eq!(args.mode, Mode::Nohup);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_variant_is_rejected() {
        let res = Cli::try_parse_from(["ceqctl", "run", "SVM"]);
        assert!(res.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["cluster", "down", "--dry-run"]);
        assert!(cli.dry_run);
        assert!(matches!(
            cli.command,
            Commands::Workflow(Workflow::Cluster {
                action: Action::Down
            })
        ));
    }

    #[test]
    fn submit_builds_remote_plan() {
        let cli = parse(&["submit", "experiments", "LSVM", "6", "7"]);
        let Commands::Workflow(w) = &cli.command else {
            panic!("expected workflow");
        };
        let plan = w.plan(&settings()).unwrap();
        assert_eq!(plan.name, "submit-experiments");
    }

    #[test]
    fn show_wraps_a_workflow() {
        let cli = parse(&["show", "setup"]);
        let Commands::Show { workflow } = &cli.command else {
            panic!("expected show");
        };
        assert_eq!(workflow.plan(&settings()).unwrap().len(), 4);
    }

    #[test]
    fn run_uses_session_environment() {
        let cli = parse(&["run", "LSVM"]);
        let Commands::Workflow(w) = &cli.command else {
            panic!("expected workflow");
        };
        assert!(w.context(&settings()).env.get("JAVA_HOME").is_some());
    }

    #[tokio::test]
    async fn requirements_flag_feeds_the_setup_plan() {
        let path = std::env::temp_dir().join(format!("ceqctl-req-{}.txt", std::process::id()));
        std::fs::write(&path, "pyspark==3.1.1\n").unwrap();
        let cli = parse(&["show", "setup", "--requirements", path.to_str().unwrap()]);
        let resolved = cli.resolve(settings()).await;
        std::fs::remove_file(&path).unwrap();

        let Commands::Show { workflow } = &cli.command else {
            panic!("expected show");
        };
        let plan = workflow.plan(&resolved.unwrap()).unwrap();
        match &plan.steps[3] {
            ceq_model::StepSpec::Manifest { manifest, .. } => {
                assert_eq!(manifest.to_args(), vec!["pyspark==3.1.1"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
