use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{NodeAddress, NodeSpec, NodeStatus, PodCondition};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

pub const INTERNAL_IP: &str = "InternalIP";
pub const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";
pub const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";
pub const ARCH_LABEL: &str = "kubernetes.io/arch";
pub const OS_LABEL: &str = "kubernetes.io/os";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: ClusterUrl,
    pub api_token: String,
    pub endpoint_name: Option<String>,
    pub state_endpoint_name: Option<String>,
    pub state_endpoint_namespace: Option<String>,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub node_filter_labels: String,
    pub node_filter_annotations: String,
    pub pod_filter_labels: String,
    pub pod_filter_annotations: String,
    pub api_server: ScrapeTarget,
    pub controller: ScrapeTarget,
    pub scheduler: ScrapeTarget,
    pub kubelet: ScrapeTarget,
}

impl Config {
    pub fn require_endpoint_name(&self) -> Result<&str> {
        self.endpoint_name
            .as_deref()
            .ok_or_else(|| Error::Configuration("KUBE_ENDPOINT_NAME".to_string()))
    }

    pub fn require_state_endpoint_name(&self) -> Result<&str> {
        self.state_endpoint_name
            .as_deref()
            .ok_or_else(|| Error::Configuration("KUBE_STATE_ENDPOINT_NAME".to_string()))
    }
}

/// API base URL split into its parts. Scheme and port are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterUrl {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// The URL as configured, trailing slashes removed. Requests are issued
    /// against this so that path prefixes of proxied API servers survive.
    pub base: String,
}

/// Scheme and port a component serves its metrics on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    pub scheme: String,
    pub port: u16,
}

impl ScrapeTarget {
    pub fn new(scheme: impl Into<String>, port: u16) -> Self {
        Self { scheme: scheme.into(), port }
    }
}

/// Normalized quantity. Strings with an unknown unit are carried through as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Amount {
    Cores(f64),
    Bytes(u64),
    Raw(String),
}

impl Default for Amount {
    fn default() -> Self {
        Amount::Cores(0.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Cores(n) => write!(f, "{}", n),
            Amount::Bytes(n) => write!(f, "{}", n),
            Amount::Raw(s) => f.write_str(s),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Amount::Cores(n) => serialize_cores(n, serializer),
            Amount::Bytes(n) => serializer.serialize_u64(*n),
            Amount::Raw(s) => serializer.serialize_str(s),
        }
    }
}

// Whole cores are written as JSON integers (`4`, not `4.0`).
fn serialize_cores<S: Serializer>(cores: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if cores.fract() == 0.0 && cores.abs() < MAX_EXACT {
        serializer.serialize_i64(*cores as i64)
    } else {
        serializer.serialize_f64(*cores)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CpuMemory {
    #[serde(serialize_with = "serialize_cores")]
    pub cpu: f64,
    pub memory: u64,
}

/// Limits, requests and restarts summed over all containers of one pod.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTotals {
    pub limits: CpuMemory,
    pub requests: CpuMemory,
    pub restart_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub conditions: Vec<PodCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub containers: ResourceTotals,
}

/// Capacity or allocatable block with cpu and memory normalized.
#[derive(Debug, Default, Clone, Serialize)]
pub struct NodeResources {
    pub cpu: Amount,
    pub memory: Amount,
    #[serde(flatten)]
    pub other: BTreeMap<String, Quantity>,
}

/// Node status as reported, with capacity and allocatable normalized and the
/// aggregation results added.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedNodeStatus {
    /// Everything else the API reported. `capacity`, `allocatable` and
    /// `images` are always `None` here.
    #[serde(flatten)]
    pub reported: NodeStatus,
    pub capacity: NodeResources,
    pub allocatable: NodeResources,
    pub pods_count: usize,
    pub roles: String,
}

/// A node after aggregation: pods folded in, quantities normalized, managed
/// fields and the image list dropped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedNode {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<NodeSpec>,
    pub status: AnnotatedNodeStatus,
    pub pods: Vec<PodSummary>,
}

impl AnnotatedNode {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.labels.as_ref()
    }

    pub fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.annotations.as_ref()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels().and_then(|l| l.get(key)).map(String::as_str)
    }

    pub fn internal_ip(&self) -> Option<&str> {
        first_internal_ip(self.status.reported.addresses.as_deref().unwrap_or_default())
    }
}

/// First address of type `InternalIP`, if the node reports one.
pub fn first_internal_ip(addresses: &[NodeAddress]) -> Option<&str> {
    addresses
        .iter()
        .find(|a| a.type_ == INTERNAL_IP)
        .map(|a| a.address.as_str())
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregatedNodes {
    pub nodes: Vec<AnnotatedNode>,
    #[serde(rename = "endpointIPs", serialize_with = "ips_as_object")]
    pub endpoint_ips: BTreeSet<String>,
}

fn ips_as_object<S: Serializer>(ips: &BTreeSet<String>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(ips.len()))?;
    for ip in ips {
        map.serialize_entry(ip, "")?;
    }
    map.end()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    #[serde(rename = "{#NAME}")]
    pub name: String,
    #[serde(rename = "{#IP}")]
    pub ip: String,
    #[serde(rename = "{#ROLES}")]
    pub roles: String,
    #[serde(rename = "{#ARCH}")]
    pub arch: String,
    #[serde(rename = "{#OS}")]
    pub os: String,
    #[serde(rename = "{#CLUSTER_HOSTNAME}")]
    pub cluster_hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodRecord {
    #[serde(rename = "{#POD}")]
    pub pod: String,
    #[serde(rename = "{#NAMESPACE}")]
    pub namespace: String,
    #[serde(rename = "{#NODE}")]
    pub node: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlPlaneRecord {
    #[serde(rename = "{#NAME}")]
    pub name: String,
    #[serde(rename = "{#IP}")]
    pub ip: String,
    #[serde(rename = "{#KUBE.API.SERVER.URL}")]
    pub api_server_url: String,
    #[serde(rename = "{#KUBE.CONTROLLER.SERVER.URL}")]
    pub controller_url: String,
    #[serde(rename = "{#KUBE.SCHEDULER.SERVER.URL}")]
    pub scheduler_url: String,
    #[serde(rename = "{#COMPONENT.API}")]
    pub component_api: &'static str,
    #[serde(rename = "{#COMPONENT.CONTROLLER}")]
    pub component_controller: &'static str,
    #[serde(rename = "{#COMPONENT.SCHEDULER}")]
    pub component_scheduler: &'static str,
    #[serde(rename = "{#CLUSTER_HOSTNAME}")]
    pub cluster_hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KubeletRecord {
    #[serde(rename = "{#NAME}")]
    pub name: String,
    #[serde(rename = "{#IP}")]
    pub ip: String,
    #[serde(rename = "{#KUBE.KUBELET.URL}")]
    pub kubelet_url: String,
    #[serde(rename = "{#COMPONENT}")]
    pub component: &'static str,
    #[serde(rename = "{#CLUSTER_HOSTNAME}")]
    pub cluster_hostname: String,
}

/// Error payload printed in place of a record set.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub error: String,
}
