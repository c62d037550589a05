// Folding of nodes, pods and endpoints into one annotated node list
pub mod endpoints;
pub mod nodes;
pub mod pods;

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::types::AggregatedNodes;

/// Join pods onto the node whose internal IP equals the pod's host IP.
///
/// A node's pod count grows by the number of containers of each matching pod,
/// not by one per pod. Nodes without an internal IP get no pods.
pub fn aggregate(nodes: Vec<Node>, pods: &[Pod], endpoint_ips: BTreeSet<String>) -> AggregatedNodes {
    let nodes = nodes
        .into_iter()
        .map(|node| {
            let mut node_pods = Vec::new();
            let mut pods_count = 0usize;

            match nodes::internal_ip(&node) {
                Some(ip) => {
                    for pod in pods.iter().filter(|p| pods::host_ip(p) == Some(ip)) {
                        let (summary, containers) = pods::summarize(pod);
                        pods_count += containers;
                        node_pods.push(summary);
                    }
                }
                None => warn!("Node \"{}\" has no InternalIP address, no pods assigned", node.name_any()),
            }

            debug!("Node \"{}\": {} pods, {} containers", node.name_any(), node_pods.len(), pods_count);
            nodes::annotate(node, node_pods, pods_count)
        })
        .collect();

    AggregatedNodes { nodes, endpoint_ips }
}
