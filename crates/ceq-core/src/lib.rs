pub mod config;
pub use config::Settings;

pub mod error;
pub use error::{CoreError, RunnerError};

pub mod events;
pub use events::{Bus, Subscribe};

pub mod pipeline;
pub use pipeline::{Pipeline, RunReport};

pub mod plan;

pub mod router;
pub use router::RunnerRouter;

pub mod runner;
pub use runner::{BuildContext, CollectRunner, InstallRunner, ProvisionRunner, Runner, SubmitRunner};

pub mod state;
pub use state::{RunState, Summary};

pub mod step;
pub use step::{CommandStep, ManifestStep, Probe, Step, StepContext, StepOutcome, StepRef};

pub mod workflow;
