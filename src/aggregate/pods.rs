use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use tracing::debug;

use crate::parsing::{parse_cpu, parse_memory};
use crate::types::{Amount, CpuMemory, PodSummary, ResourceTotals};

pub fn host_ip(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.host_ip.as_deref())
}

fn containers(pod: &Pod) -> &[Container] {
    pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default()
}

fn add_quantities(target: &mut CpuMemory, quantities: Option<&BTreeMap<String, Quantity>>, pod: &str) {
    let Some(quantities) = quantities else {
        return;
    };
    let cpu = parse_cpu(quantities.get("cpu").map(|q| q.0.as_str()));
    let memory = parse_memory(quantities.get("memory").map(|q| q.0.as_str()));

    match cpu {
        Amount::Cores(n) => target.cpu += n,
        other => debug!("Pod \"{}\": not summing cpu quantity \"{}\"", pod, other),
    }
    match memory {
        Amount::Bytes(n) => target.memory = target.memory.saturating_add(n),
        other => debug!("Pod \"{}\": not summing memory quantity \"{}\"", pod, other),
    }
}

/// Sum the limits, requests and restarts of all containers of `pod`.
pub fn sum_resources(pod: &Pod) -> ResourceTotals {
    let name = pod.name_any();
    let mut totals = ResourceTotals::default();

    for container in containers(pod) {
        let resources = container.resources.as_ref();
        add_quantities(&mut totals.limits, resources.and_then(|r| r.limits.as_ref()), &name);
        add_quantities(&mut totals.requests, resources.and_then(|r| r.requests.as_ref()), &name);
    }

    totals.restart_count = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(|cs| i64::from(cs.restart_count)).sum())
        .unwrap_or(0);

    totals
}

/// Fold a pod into the summary carried on its node, along with the number of
/// containers it contributes to the node's pod count.
pub fn summarize(pod: &Pod) -> (PodSummary, usize) {
    let status = pod.status.as_ref();
    let summary = PodSummary {
        name: pod.name_any(),
        namespace: pod.namespace().unwrap_or_default(),
        labels: pod.metadata.labels.clone(),
        annotations: pod.metadata.annotations.clone(),
        phase: status.and_then(|s| s.phase.clone()),
        conditions: status.and_then(|s| s.conditions.clone()).unwrap_or_default(),
        start_time: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
        containers: sum_resources(pod),
    };
    (summary, containers(pod).len())
}
