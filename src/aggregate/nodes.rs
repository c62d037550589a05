use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::Resource;

use crate::parsing::{parse_cpu, parse_memory};
use crate::types::{
    first_internal_ip, AnnotatedNode, AnnotatedNodeStatus, NodeResources, PodSummary, ROLE_LABEL_PREFIX,
};

pub fn internal_ip(node: &Node) -> Option<&str> {
    node.status
        .as_ref()
        .and_then(|s| s.addresses.as_deref())
        .and_then(first_internal_ip)
}

/// Roles advertised through `node-role.kubernetes.io/<role>` label keys,
/// joined for display.
pub fn roles(labels: Option<&BTreeMap<String, String>>) -> String {
    labels
        .into_iter()
        .flat_map(|l| l.keys())
        .filter_map(|key| key.strip_prefix(ROLE_LABEL_PREFIX))
        .map(|rest| {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
                .unwrap_or(rest.len());
            &rest[..end]
        })
        .filter(|role| !role.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Replace the cpu and memory quantities with numbers; everything else
/// (pods, ephemeral-storage, hugepages) is kept verbatim.
pub fn normalize_resources(resources: Option<BTreeMap<String, Quantity>>) -> NodeResources {
    let mut other = resources.unwrap_or_default();
    let cpu = other.remove("cpu");
    let memory = other.remove("memory");

    NodeResources {
        cpu: parse_cpu(cpu.as_ref().map(|q| q.0.as_str())),
        memory: parse_memory(memory.as_ref().map(|q| q.0.as_str())),
        other,
    }
}

/// Attach the pods found on `node` and strip what the discovery consumers do
/// not need (managed fields, image list). Everything else is passed through.
pub fn annotate(node: Node, pods: Vec<PodSummary>, pods_count: usize) -> AnnotatedNode {
    let Node {
        mut metadata,
        spec,
        status,
    } = node;
    metadata.managed_fields = None;
    let roles = roles(metadata.labels.as_ref());

    let mut reported = status.unwrap_or_default();
    reported.images = None;
    let capacity = normalize_resources(reported.capacity.take());
    let allocatable = normalize_resources(reported.allocatable.take());

    AnnotatedNode {
        api_version: Node::API_VERSION,
        kind: Node::KIND,
        metadata,
        spec,
        status: AnnotatedNodeStatus {
            reported,
            capacity,
            allocatable,
            pods_count,
            roles,
        },
        pods,
    }
}
