mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod kind;
pub use kind::*;

mod artifact;
pub use artifact::{ArtifactSource, ArtifactSpec};

mod install;
pub use install::{Drift, Manifest, Pin, RuntimeArchive};

mod job;
pub use job::{Job, JobSpec, Launch, LocalMode, MarketJob, ModelVariant, Program};

mod resource;
pub use resource::{ClusterSpec, InstanceSpec, Resource, ResourceId, ResourceKind};
