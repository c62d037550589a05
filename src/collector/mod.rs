use std::fmt::Debug;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Endpoints, Node, Pod};
use kube::api::{Api, ListParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::aggregate::{self, endpoints};
use crate::error::{Error, Result};
use crate::kubernetes::ScrapeClient;
use crate::types::{AggregatedNodes, Config};

/// Fetch every object of kind `K` across all namespaces, following
/// continuation tokens until the server stops handing them out. Any failing
/// page aborts the whole collection.
pub async fn collect<K>(client: &Client, page_size: u32) -> Result<Vec<K>>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let resource = K::plural(&()).to_string();
    let api: Api<K> = Api::all(client.clone());
    let base_params = ListParams::default().limit(page_size);

    let mut all_items: Vec<K> = Vec::new();
    let mut continue_token: Option<String> = None;
    let mut page_count = 0u32;

    loop {
        let mut params = base_params.clone();
        if let Some(ref token) = continue_token {
            params = params.continue_token(token);
        }

        let list = api.list(&params).await.map_err(|e| Error::from_kube(e, &resource))?;
        page_count += 1;

        let items_count = list.items.len();
        all_items.extend(list.items);

        match list.metadata.continue_ {
            Some(token) if !token.is_empty() => {
                debug!(
                    resource = %resource,
                    page = page_count,
                    items_this_page = items_count,
                    total_so_far = all_items.len(),
                    "Fetched page, continuing"
                );
                continue_token = Some(token);
            }
            _ => break,
        }
    }

    debug!(resource = %resource, pages = page_count, total_items = all_items.len(), "Collection complete");
    Ok(all_items)
}

/// Fetches the objects one invocation works on, strictly one call after the
/// other. Nothing is cached between runs.
pub struct SnapshotCollector<'a> {
    client: &'a Client,
    config: &'a Config,
}

impl<'a> SnapshotCollector<'a> {
    pub fn new(client: &'a Client, config: &'a Config) -> Self {
        Self { client, config }
    }

    pub async fn nodes(&self) -> Result<Vec<Node>> {
        collect(self.client, self.config.page_size).await
    }

    pub async fn pods(&self) -> Result<Vec<Pod>> {
        collect(self.client, self.config.page_size).await
    }

    pub async fn endpoints(&self) -> Result<Vec<Endpoints>> {
        collect(self.client, self.config.page_size).await
    }

    /// Endpoints, pods and nodes, fetched in that order and folded into
    /// annotated nodes. Objects created or removed between the calls may be
    /// represented inconsistently.
    pub async fn aggregated_nodes(&self) -> Result<AggregatedNodes> {
        let endpoint_name = self.config.require_endpoint_name()?;

        let endpoint_list = self.endpoints().await?;
        let endpoint_ips = endpoints::endpoint_ips(&endpoint_list, endpoint_name);
        let pods = self.pods().await?;
        let nodes = self.nodes().await?;
        info!(
            "Collected {} nodes, {} pods, {} endpoint IPs",
            nodes.len(),
            pods.len(),
            endpoint_ips.len()
        );

        Ok(aggregate::aggregate(nodes, &pods, endpoint_ips))
    }

    /// Locate the metrics aggregator endpoint and return the text it serves
    /// on `/metrics`.
    pub async fn state_metrics(&self) -> Result<String> {
        let name = self.config.require_state_endpoint_name()?;

        let candidates = match self.config.state_endpoint_namespace.as_deref() {
            Some(ns) => {
                let api: Api<Endpoints> = Api::namespaced(self.client.clone(), ns);
                let endpoint = api
                    .get(name)
                    .await
                    .map_err(|e| Error::from_kube(e, &format!("endpoints/{}", name)))?;
                vec![endpoint]
            }
            None => self.endpoints().await?,
        };

        let url = endpoints::resolve_metrics_url(&candidates, name)?;
        let metrics_url = format!("{}/metrics", url);
        let scraper = ScrapeClient::new(
            &self.config.api_token,
            Duration::from_secs(self.config.request_timeout_secs),
        )?;
        let body = scraper.get_text(&metrics_url).await?;
        if body.trim().is_empty() {
            return Err(Error::response_shape(metrics_url, "empty metrics body"));
        }
        Ok(body)
    }
}
