use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where experiment output is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "camelCase")]
pub enum ArtifactSource {
    /// Object-storage prefix, e.g. `gs://bucket/results/`.
    Bucket { uri: String },
    /// Path on a provisioned instance.
    Instance {
        name: String,
        zone: String,
        path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSpec {
    pub source: ArtifactSource,
    /// Local destination directory.
    pub destination: PathBuf,
}
