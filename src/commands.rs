use k8s_openapi::api::core::v1::Node;
use tracing::info;

use crate::aggregate::nodes::annotate;
use crate::cli::Command;
use crate::collector::SnapshotCollector;
use crate::discovery::{
    project_control_plane, project_kubelets, project_nodes, project_pods, ControlPlaneTargets, EntityFilters,
};
use crate::error::Result;
use crate::filter::parse_filters;
use crate::kubernetes;
use crate::types::{
    AggregatedNodes, AnnotatedNode, Config, ControlPlaneRecord, ErrorPayload, KubeletRecord, NodeRecord, PodRecord,
};

/// What a command produced, ready to be rendered on stdout.
#[derive(Debug)]
pub enum Output {
    Nodes(AggregatedNodes),
    NodeRecords(Vec<NodeRecord>),
    PodRecords(Vec<PodRecord>),
    ControlPlaneRecords(Vec<ControlPlaneRecord>),
    KubeletRecords(Vec<KubeletRecord>),
    Text(String),
}

impl Output {
    pub fn render(&self, pretty: bool) -> serde_json::Result<String> {
        match self {
            Output::Nodes(v) => to_json(v, pretty),
            Output::NodeRecords(v) => to_json(v, pretty),
            Output::PodRecords(v) => to_json(v, pretty),
            Output::ControlPlaneRecords(v) => to_json(v, pretty),
            Output::KubeletRecords(v) => to_json(v, pretty),
            Output::Text(text) => Ok(text.clone()),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

/// Render a failure as `{"error":"<message>."}`.
pub fn render_error(message: &str) -> String {
    let message = message.trim_end();
    let error = if message.ends_with('.') {
        message.to_string()
    } else {
        format!("{}.", message)
    };
    serde_json::to_string(&ErrorPayload { error }).unwrap_or_else(|_| r#"{"error":"Unknown error."}"#.to_string())
}

pub fn node_filters(config: &Config) -> EntityFilters {
    EntityFilters::new(
        parse_filters(&config.node_filter_labels),
        parse_filters(&config.node_filter_annotations),
    )
}

pub fn pod_filters(config: &Config) -> EntityFilters {
    EntityFilters::new(
        parse_filters(&config.pod_filter_labels),
        parse_filters(&config.pod_filter_annotations),
    )
}

fn annotate_bare(nodes: Vec<Node>) -> Vec<AnnotatedNode> {
    nodes.into_iter().map(|node| annotate(node, Vec::new(), 0)).collect()
}

/// Run one command against the cluster described by `config`.
pub async fn execute(command: Command, config: &Config) -> Result<Output> {
    let client = kubernetes::connect(config)?;
    let collector = SnapshotCollector::new(&client, config);
    let cluster_hostname = config.api_url.host.as_str();

    let output = match command {
        Command::Nodes => Output::Nodes(collector.aggregated_nodes().await?),
        Command::NodeDiscovery => {
            let aggregated = collector.aggregated_nodes().await?;
            let records = project_nodes(
                &aggregated.nodes,
                &aggregated.endpoint_ips,
                &node_filters(config),
                cluster_hostname,
            );
            Output::NodeRecords(records)
        }
        Command::PodDiscovery => {
            let aggregated = collector.aggregated_nodes().await?;
            Output::PodRecords(project_pods(&aggregated.nodes, &node_filters(config), &pod_filters(config)))
        }
        Command::ControlPlaneDiscovery => {
            let nodes = annotate_bare(collector.nodes().await?);
            let targets = ControlPlaneTargets {
                api_server: config.api_server.clone(),
                controller: config.controller.clone(),
                scheduler: config.scheduler.clone(),
            };
            Output::ControlPlaneRecords(project_control_plane(&nodes, &targets, cluster_hostname))
        }
        Command::KubeletDiscovery => {
            let nodes = annotate_bare(collector.nodes().await?);
            Output::KubeletRecords(project_kubelets(&nodes, &config.kubelet, cluster_hostname))
        }
        Command::StateMetrics => Output::Text(collector.state_metrics().await?),
    };

    info!("Command {:?} finished", command);
    Ok(output)
}
