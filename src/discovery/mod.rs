use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::filter::{admits, FilterExpression};
use crate::parsing::scrape_url;
use crate::types::{
    AnnotatedNode, ControlPlaneRecord, KubeletRecord, NodeRecord, PodRecord, ScrapeTarget, ARCH_LABEL,
    CONTROL_PLANE_LABEL, OS_LABEL,
};

/// Filters applied to one kind of entity: both must admit it.
#[derive(Debug, Clone, Default)]
pub struct EntityFilters {
    pub labels: Vec<FilterExpression>,
    pub annotations: Vec<FilterExpression>,
}

impl EntityFilters {
    pub fn new(labels: Vec<FilterExpression>, annotations: Vec<FilterExpression>) -> Self {
        Self { labels, annotations }
    }

    fn admit_node(&self, node: &AnnotatedNode) -> bool {
        let name = node.name();
        admits(name, node.labels(), &self.labels) && admits(name, node.annotations(), &self.annotations)
    }
}

/// Scrape targets of the control plane components.
#[derive(Debug, Clone)]
pub struct ControlPlaneTargets {
    pub api_server: ScrapeTarget,
    pub controller: ScrapeTarget,
    pub scheduler: ScrapeTarget,
}

/// One record per node admitted by `filters` whose internal IP is among
/// `endpoint_ips`.
pub fn project_nodes(
    nodes: &[AnnotatedNode],
    endpoint_ips: &BTreeSet<String>,
    filters: &EntityFilters,
    cluster_hostname: &str,
) -> Vec<NodeRecord> {
    nodes
        .iter()
        .filter(|node| filters.admit_node(node))
        .filter_map(|node| {
            let ip = node.internal_ip().unwrap_or_default();
            if !endpoint_ips.contains(ip) {
                debug!("Node \"{}\" is not included in the list of endpoint IPs", node.name());
                return None;
            }
            debug!("Filtered node \"{}\"", node.name());
            Some(NodeRecord {
                name: node.name().to_string(),
                ip: ip.to_string(),
                roles: node.status.roles.clone(),
                arch: node.label(ARCH_LABEL).unwrap_or_default().to_string(),
                os: node.label(OS_LABEL).unwrap_or_default().to_string(),
                cluster_hostname: cluster_hostname.to_string(),
            })
        })
        .collect()
}

/// One record per pod admitted by `pod_filters` on a node admitted by
/// `node_filters`. Endpoint IPs are not consulted here.
pub fn project_pods(nodes: &[AnnotatedNode], node_filters: &EntityFilters, pod_filters: &EntityFilters) -> Vec<PodRecord> {
    let mut records = Vec::new();
    for node in nodes.iter().filter(|node| node_filters.admit_node(node)) {
        for pod in &node.pods {
            if admits(&pod.name, pod.labels.as_ref(), &pod_filters.labels)
                && admits(&pod.name, pod.annotations.as_ref(), &pod_filters.annotations)
            {
                debug!("Filtered pod \"{}\"", pod.name);
                records.push(PodRecord {
                    pod: pod.name.clone(),
                    namespace: pod.namespace.clone(),
                    node: node.name().to_string(),
                });
            }
        }
    }
    records
}

/// Internal IP of `node`, or `None` with a warning when it has none.
fn scrape_ip(node: &AnnotatedNode) -> Option<&str> {
    let ip = node.internal_ip().filter(|ip| !ip.is_empty());
    if ip.is_none() {
        warn!("Node \"{}\" has no InternalIP address, skipped", node.name());
    }
    ip
}

/// Metrics URLs of the API server, controller manager and scheduler on every
/// node labelled as control plane. Nodes without an internal IP are skipped.
pub fn project_control_plane(
    nodes: &[AnnotatedNode],
    targets: &ControlPlaneTargets,
    cluster_hostname: &str,
) -> Vec<ControlPlaneRecord> {
    nodes
        .iter()
        .filter(|node| node.labels().is_some_and(|l| l.contains_key(CONTROL_PLANE_LABEL)))
        .filter_map(|node| {
            let ip = scrape_ip(node)?;
            let metrics = |t: &ScrapeTarget| format!("{}/metrics", scrape_url(&t.scheme, ip, t.port));
            Some(ControlPlaneRecord {
                name: node.name().to_string(),
                ip: ip.to_string(),
                api_server_url: metrics(&targets.api_server),
                controller_url: metrics(&targets.controller),
                scheduler_url: metrics(&targets.scheduler),
                component_api: "API",
                component_controller: "Controller manager",
                component_scheduler: "Scheduler",
                cluster_hostname: cluster_hostname.to_string(),
            })
        })
        .collect()
}

/// Kubelet base URL for every node with an internal IP.
pub fn project_kubelets(nodes: &[AnnotatedNode], kubelet: &ScrapeTarget, cluster_hostname: &str) -> Vec<KubeletRecord> {
    nodes
        .iter()
        .filter_map(|node| {
            let ip = scrape_ip(node)?;
            Some(KubeletRecord {
                name: node.name().to_string(),
                ip: ip.to_string(),
                kubelet_url: scrape_url(&kubelet.scheme, ip, kubelet.port),
                component: "Kubelet",
                cluster_hostname: cluster_hostname.to_string(),
            })
        })
        .collect()
}
