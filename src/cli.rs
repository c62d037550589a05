use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "kube-discovery", version, about = "Kubernetes node, pod and component discovery")]
pub struct Cli {
    /// Indent the JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Annotated node list with per-node pods and endpoint IPs
    Nodes,
    /// Discovery records for nodes backing the configured endpoint
    NodeDiscovery,
    /// Discovery records for pods on admitted nodes
    PodDiscovery,
    /// Metrics URLs of API server, controller manager and scheduler
    ControlPlaneDiscovery,
    /// Kubelet URL for every node
    KubeletDiscovery,
    /// Raw text served by the state metrics endpoint
    StateMetrics,
}
