use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ArtifactSpec, JobSpec, Manifest, Resource, RuntimeArchive};

/// One orchestration step.
///
/// Each variant carries everything needed to build and run the step; runners turn it into an executable step.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum StepSpec {
    /// Create a VM or cluster.
    Provision { resource: Resource },
    /// Delete a VM or cluster previously created in the same plan.
    Teardown { resource: Resource },
    /// Install distribution packages.
    SystemPackages {
        packages: Vec<String>,
        /// Run the package manager through `sudo`.
        #[serde(default = "default_true")]
        sudo: bool,
    },
    /// Download and unpack a language runtime.
    Runtime { archive: RuntimeArchive },
    /// Create an isolated Python environment.
    VirtualEnv { path: PathBuf },
    /// Install the pinned manifest into an isolated environment.
    Manifest { venv: PathBuf, manifest: Manifest },
    /// Copy a packaged code bundle to object storage.
    UploadBundle { local: PathBuf, uri: String },
    /// Start an external program locally or on a cluster.
    Submit { job: JobSpec },
    /// Fetch experiment output.
    Collect { artifact: ArtifactSpec },
}

fn default_true() -> bool {
    true
}

impl StepSpec {
    /// Short symbolic identifier, used for logging and routing.
    pub fn kind(&self) -> &'static str {
        match self {
            StepSpec::Provision { .. } => "provision",
            StepSpec::Teardown { .. } => "teardown",
            StepSpec::SystemPackages { .. } => "system-packages",
            StepSpec::Runtime { .. } => "runtime",
            StepSpec::VirtualEnv { .. } => "virtual-env",
            StepSpec::Manifest { .. } => "manifest",
            StepSpec::UploadBundle { .. } => "upload-bundle",
            StepSpec::Submit { .. } => "submit",
            StepSpec::Collect { .. } => "collect",
        }
    }
}

/// Named, ordered list of steps executed sequentially.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub steps: Vec<StepSpec>,
}

impl Plan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
