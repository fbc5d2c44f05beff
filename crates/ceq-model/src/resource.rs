use std::fmt;

use serde::{Deserialize, Serialize};

/// Single VM used for local (tmux) experiment runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    pub name: String,
    pub zone: String,
    pub machine_type: String,
    pub image_family: String,
    pub image_project: String,
    /// Boot disk size in GB.
    #[serde(default = "default_boot_disk_gb")]
    pub boot_disk_gb: u32,
}

fn default_boot_disk_gb() -> u32 {
    200
}

/// Managed cluster used for distributed (spark) submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub name: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub master_machine_type: String,
    pub worker_machine_type: String,
    pub num_workers: u32,
    /// Idle timeout; the provider deletes the cluster after this many idle seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_version: Option<String>,
}

/// A provisionable compute resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Resource {
    Instance(InstanceSpec),
    Cluster(ClusterSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Instance,
    Cluster,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Cluster => "cluster",
        }
    }
}

/// Identity a resource is created and deleted under.
///
/// Location is the zone for instances and the region for clusters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
    pub location: String,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.kind.as_str(), self.name, self.location)
    }
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Instance(_) => ResourceKind::Instance,
            Resource::Cluster(_) => ResourceKind::Cluster,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Instance(i) => &i.name,
            Resource::Cluster(c) => &c.name,
        }
    }

    pub fn id(&self) -> ResourceId {
        let location = match self {
            Resource::Instance(i) => i.zone.clone(),
            Resource::Cluster(c) => c.region.clone(),
        };
        ResourceId {
            kind: self.kind(),
            name: self.name().to_string(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> ClusterSpec {
        ClusterSpec {
            name: "ceq-cluster".into(),
            region: "us-central1".into(),
            zone: None,
            master_machine_type: "n1-standard-4".into(),
            worker_machine_type: "n1-standard-4".into(),
            num_workers: 2,
            max_idle_secs: Some(3600),
            image_version: None,
        }
    }

    #[test]
    fn id_uses_region_for_clusters() {
        let id = Resource::Cluster(cluster()).id();
        assert_eq!(id.kind, ResourceKind::Cluster);
        assert_eq!(id.location, "us-central1");
        assert_eq!(id.to_string(), "cluster/ceq-cluster@us-central1");
    }

    #[test]
    fn same_name_different_kind_is_different_id() {
        let c = Resource::Cluster(cluster());
        let i = Resource::Instance(InstanceSpec {
            name: "ceq-cluster".into(),
            zone: "us-central1".into(),
            machine_type: "e2-standard-8".into(),
            image_family: "ubuntu-2204-lts".into(),
            image_project: "ubuntu-os-cloud".into(),
            boot_disk_gb: 200,
        });
        assert_ne!(c.id(), i.id());
    }

    #[test]
    fn serde_tagged_by_type() {
        let json = serde_json::to_value(Resource::Cluster(cluster())).unwrap();
        assert_eq!(json["type"], "cluster");
        assert_eq!(json["numWorkers"], 2);
        assert_eq!(json["maxIdleSecs"], 3600);
        assert!(json.get("zone").is_none());
    }

    #[test]
    fn instance_boot_disk_defaults() {
        let json = r#"{
            "type": "instance",
            "name": "vm",
            "zone": "us-central1-a",
            "machineType": "e2-standard-8",
            "imageFamily": "ubuntu-2204-lts",
            "imageProject": "ubuntu-os-cloud"
        }"#;
        let r: Resource = serde_json::from_str(json).unwrap();
        match r {
            Resource::Instance(i) => assert_eq!(i.boot_disk_gb, 200),
            other => panic!("unexpected {other:?}"),
        }
    }
}
