// Public modules
pub mod error;
pub mod types;
pub mod config;
pub mod parsing;
pub mod kubernetes;
pub mod collector;
pub mod aggregate;
pub mod filter;
pub mod discovery;
pub mod cli;
pub mod commands;

// Re-export commonly used items
pub use error::{Error, MetricsEndpointError, Result};
pub use types::*;
pub use config::{load_config, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{parse_api_url, parse_cpu, parse_memory};
pub use kubernetes::{connect, ScrapeClient};
pub use collector::{collect, SnapshotCollector};
pub use aggregate::aggregate;
pub use aggregate::endpoints::{endpoint_ips, resolve_metrics_url};
pub use filter::{admits, parse_filters, FilterExpression};
pub use discovery::{project_control_plane, project_kubelets, project_nodes, project_pods, ControlPlaneTargets, EntityFilters};
pub use commands::{execute, Output};
