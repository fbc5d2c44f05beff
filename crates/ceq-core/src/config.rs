//! Run settings resolved from environment variables.
//!
//! Every value has a default matching the shared experiment setup, except the bucket,
//! which is required only by the steps that touch object storage.

use std::path::{Path, PathBuf};

use ceq_model::{ClusterSpec, Env, InstanceSpec, Manifest, Pin, RuntimeArchive};

use crate::error::CoreError;

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_ZONE: &str = "us-central1-a";
pub const DEFAULT_INSTANCE: &str = "ceq-instance";
pub const DEFAULT_CLUSTER: &str = "ceq-cluster";

pub const DEFAULT_MACHINE_TYPE: &str = "e2-standard-8";
pub const DEFAULT_IMAGE_FAMILY: &str = "ubuntu-2204-lts";
pub const DEFAULT_IMAGE_PROJECT: &str = "ubuntu-os-cloud";
pub const DEFAULT_BOOT_DISK_GB: u32 = 200;

pub const DEFAULT_CLUSTER_MACHINE_TYPE: &str = "n1-standard-4";
pub const DEFAULT_NUM_WORKERS: u32 = 2;
pub const DEFAULT_MAX_IDLE_SECS: u64 = 3600;

pub const DEFAULT_OUTPUT_DIR: &str = "value_models_output/";
pub const DEFAULT_INPUT_PREFIX: &str = "all_sm_markets/values_1_to_10/";
pub const DEFAULT_OUTPUT_PREFIX: &str = "experiments_results/";

pub const RUNTIME_URL: &str =
    "https://download.java.net/openjdk/jdk11/ri/openjdk-11+28_linux-x64_bin.tar.gz";
pub const RUNTIME_HOME_VAR: &str = "JAVA_HOME";

pub const SYSTEM_PACKAGES: &[&str] = &[
    "tmux",
    "wget",
    "zip",
    "python3-pip",
    "python3-venv",
];

/// Library versions the experiments were developed against.
pub const PINNED_MANIFEST: &[(&str, &str)] = &[
    ("numpy", "1.19.5"),
    ("pandas", "1.1.5"),
    ("pulp", "2.4"),
    ("prettytable", "2.1.0"),
    ("pkbar", "0.5"),
    ("pyspark", "3.1.1"),
];

/// Machine shape of the experiment VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceShape {
    pub machine_type: String,
    pub image_family: String,
    pub image_project: String,
    pub boot_disk_gb: u32,
}

/// Machine shape of the managed cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterShape {
    pub master_machine_type: String,
    pub worker_machine_type: String,
    pub num_workers: u32,
    pub max_idle_secs: Option<u64>,
    pub image_version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub project: Option<String>,
    pub region: String,
    pub zone: String,
    pub bucket: Option<String>,
    pub instance: String,
    pub cluster: String,

    /// Directory holding the experiment scripts on the machine running them.
    pub workdir: PathBuf,
    pub venv: PathBuf,
    /// Output directory passed to the value-model program.
    pub output_dir: String,
    /// Bucket prefix read by the market programs.
    pub input_prefix: String,
    /// Bucket prefix written by the market programs.
    pub output_prefix: String,
    /// Search path inherited from the calling process.
    pub path: Option<String>,

    pub instance_shape: InstanceShape,
    pub cluster_shape: ClusterShape,
    pub packages: Vec<String>,
    pub runtime: RuntimeArchive,
    pub manifest: Manifest,
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let workdir = PathBuf::from(or("CEQ_WORKDIR", "."));
        let venv = get("CEQ_VENV")
            .map(PathBuf::from)
            .unwrap_or_else(|| workdir.join(".venv"));

        let runtime_dir = get("CEQ_RUNTIME_DIR")
            .map(PathBuf::from)
            .or_else(|| get("HOME").map(|home| PathBuf::from(home).join(".local/jdk-11")))
            .unwrap_or_else(|| PathBuf::from("/opt/jdk-11"));

        let num_workers = match get("CEQ_NUM_WORKERS") {
            Some(v) => v
                .parse::<u32>()
                .map_err(|_| CoreError::Config(format!("CEQ_NUM_WORKERS is not a number: {v}")))?,
            None => DEFAULT_NUM_WORKERS,
        };
        // `0` disables the idle timeout.
        let max_idle_secs = match get("CEQ_MAX_IDLE_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(secs),
                Err(_) => {
                    return Err(CoreError::Config(format!(
                        "CEQ_MAX_IDLE_SECS is not a number: {v}"
                    )));
                }
            },
            None => Some(DEFAULT_MAX_IDLE_SECS),
        };

        Ok(Self {
            project: get("PROJECT"),
            region: or("REGION", DEFAULT_REGION),
            zone: or("ZONE", DEFAULT_ZONE),
            bucket: get("BUCKET_NAME"),
            instance: or("INSTANCE", DEFAULT_INSTANCE),
            cluster: or("CLUSTER", DEFAULT_CLUSTER),
            workdir,
            venv,
            output_dir: or("CEQ_OUTPUT_DIR", DEFAULT_OUTPUT_DIR),
            input_prefix: or("CEQ_INPUT_PREFIX", DEFAULT_INPUT_PREFIX),
            output_prefix: or("CEQ_OUTPUT_PREFIX", DEFAULT_OUTPUT_PREFIX),
            path: get("PATH"),
            instance_shape: InstanceShape {
                machine_type: or("CEQ_MACHINE_TYPE", DEFAULT_MACHINE_TYPE),
                image_family: DEFAULT_IMAGE_FAMILY.to_string(),
                image_project: DEFAULT_IMAGE_PROJECT.to_string(),
                boot_disk_gb: DEFAULT_BOOT_DISK_GB,
            },
            cluster_shape: ClusterShape {
                master_machine_type: or("CEQ_CLUSTER_MACHINE_TYPE", DEFAULT_CLUSTER_MACHINE_TYPE),
                worker_machine_type: or("CEQ_CLUSTER_MACHINE_TYPE", DEFAULT_CLUSTER_MACHINE_TYPE),
                num_workers,
                max_idle_secs,
                image_version: get("CEQ_IMAGE_VERSION"),
            },
            packages: SYSTEM_PACKAGES.iter().map(|p| p.to_string()).collect(),
            runtime: RuntimeArchive {
                url: RUNTIME_URL.to_string(),
                archive: PathBuf::from("/tmp/openjdk-11.tar.gz"),
                install_dir: runtime_dir,
                home_var: RUNTIME_HOME_VAR.to_string(),
            },
            manifest: Manifest(
                PINNED_MANIFEST
                    .iter()
                    .map(|(name, version)| Pin::new(*name, *version))
                    .collect(),
            ),
        })
    }

    /// Bucket name, required by storage and cluster steps.
    pub fn bucket(&self) -> Result<&str, CoreError> {
        self.bucket
            .as_deref()
            .ok_or_else(|| CoreError::Config("BUCKET_NAME is not set".into()))
    }

    /// `gs://<bucket>/<path>`.
    pub fn bucket_uri(&self, path: &str) -> Result<String, CoreError> {
        Ok(format!(
            "gs://{}/{}",
            self.bucket()?,
            path.trim_start_matches('/')
        ))
    }

    pub fn instance_spec(&self) -> InstanceSpec {
        let shape = &self.instance_shape;
        InstanceSpec {
            name: self.instance.clone(),
            zone: self.zone.clone(),
            machine_type: shape.machine_type.clone(),
            image_family: shape.image_family.clone(),
            image_project: shape.image_project.clone(),
            boot_disk_gb: shape.boot_disk_gb,
        }
    }

    pub fn cluster_spec(&self) -> ClusterSpec {
        let shape = &self.cluster_shape;
        ClusterSpec {
            name: self.cluster.clone(),
            region: self.region.clone(),
            zone: Some(self.zone.clone()),
            master_machine_type: shape.master_machine_type.clone(),
            worker_machine_type: shape.worker_machine_type.clone(),
            num_workers: shape.num_workers,
            max_idle_secs: shape.max_idle_secs,
            image_version: shape.image_version.clone(),
        }
    }

    /// Interpreter inside the isolated environment.
    pub fn python(&self) -> String {
        self.venv.join("bin/python").display().to_string()
    }

    /// Replace the pinned manifest with the pins of a requirements file.
    pub async fn with_requirements(mut self, path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        let manifest = Manifest::parse(&text)?;
        if manifest.is_empty() {
            return Err(CoreError::Config(format!("{} pins nothing", path.display())));
        }
        self.manifest = manifest;
        Ok(self)
    }

    /// Variables the runtime install exports: its home and the updated search path.
    pub fn session_env(&self) -> Env {
        runtime_exports(&self.runtime, &Env::new(), self.path.as_deref())
    }
}

/// Home variable plus `PATH` with the runtime's `bin` first.
pub fn runtime_exports(runtime: &RuntimeArchive, current: &Env, fallback_path: Option<&str>) -> Env {
    let mut env = current.clone();
    env.push(
        runtime.home_var.clone(),
        runtime.install_dir.display().to_string(),
    );
    env.prepend_path("PATH", &runtime.bin_dir().display().to_string(), fallback_path);
    env
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, CoreError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.region, DEFAULT_REGION);
        assert_eq!(s.zone, DEFAULT_ZONE);
        assert_eq!(s.cluster, DEFAULT_CLUSTER);
        assert!(s.project.is_none());
        assert_eq!(s.cluster_shape.max_idle_secs, Some(DEFAULT_MAX_IDLE_SECS));
        assert_eq!(s.venv, PathBuf::from("./.venv"));
        assert_eq!(s.runtime.install_dir, PathBuf::from("/opt/jdk-11"));
        assert_eq!(s.manifest.to_args()[0], "numpy==1.19.5");
    }

    #[test]
    fn provider_variables_are_read() {
        let s = settings(&[
            ("PROJECT", "markets-lab"),
            ("REGION", "europe-west1"),
            ("BUCKET_NAME", "ce-data"),
            ("CLUSTER", "spark-1"),
            ("HOME", "/home/exp"),
        ])
        .unwrap();
        assert_eq!(s.project.as_deref(), Some("markets-lab"));
        assert_eq!(s.cluster_spec().region, "europe-west1");
        assert_eq!(s.cluster_spec().name, "spark-1");
        assert_eq!(s.bucket_uri("/code/x.py").unwrap(), "gs://ce-data/code/x.py");
        assert_eq!(s.runtime.install_dir, PathBuf::from("/home/exp/.local/jdk-11"));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let s = settings(&[("BUCKET_NAME", "  "), ("REGION", "")]).unwrap();
        assert!(s.bucket.is_none());
        assert_eq!(s.region, DEFAULT_REGION);
    }

    #[test]
    fn missing_bucket_is_a_config_error() {
        let s = settings(&[]).unwrap();
        assert!(matches!(s.bucket_uri("x"), Err(CoreError::Config(_))));
    }

    #[test]
    fn numeric_variables_are_validated() {
        assert!(matches!(
            settings(&[("CEQ_NUM_WORKERS", "many")]),
            Err(CoreError::Config(_))
        ));
        let s = settings(&[("CEQ_NUM_WORKERS", "4"), ("CEQ_MAX_IDLE_SECS", "0")]).unwrap();
        assert_eq!(s.cluster_shape.num_workers, 4);
        assert_eq!(s.cluster_shape.max_idle_secs, None);
    }

    #[test]
    fn session_env_exports_home_and_path() {
        let s = settings(&[("CEQ_RUNTIME_DIR", "/opt/jdk"), ("PATH", "/usr/bin")]).unwrap();
        let env = s.session_env();
        assert_eq!(env.get("JAVA_HOME"), Some("/opt/jdk"));
        assert_eq!(env.get("PATH"), Some("/opt/jdk/bin:/usr/bin"));
    }

    fn scratch(text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ceq-req-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn requirements_file_replaces_manifest() {
        let path = scratch("# pinned\nnumpy==1.21.0\n\npulp==2.4\n");
        let s = settings(&[]).unwrap().with_requirements(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(s.manifest.to_args(), vec!["numpy==1.21.0", "pulp==2.4"]);
    }

    #[tokio::test]
    async fn unpinned_requirements_are_rejected() {
        let path = scratch("numpy\n");
        let res = settings(&[]).unwrap().with_requirements(&path).await;
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(CoreError::Model(_))));
    }

    #[tokio::test]
    async fn missing_requirements_file_is_a_config_error() {
        let res = settings(&[])
            .unwrap()
            .with_requirements("/nonexistent/ceq-requirements.txt")
            .await;
        assert!(matches!(res, Err(CoreError::Config(_))));
    }
}
