use std::time::Duration;

use kube::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::types::Config;

/// Build a Kubernetes client for the configured API URL and bearer token.
pub fn connect(config: &Config) -> Result<Client> {
    connect_to(
        &config.api_url.base,
        &config.api_token,
        Duration::from_secs(config.request_timeout_secs),
    )
}

/// Must be called from within a tokio runtime.
pub fn connect_to(base_url: &str, token: &str, timeout: Duration) -> Result<Client> {
    let cluster_url: http::Uri = base_url.parse().map_err(|_| Error::MalformedUrl {
        url: base_url.to_string(),
    })?;

    let mut kube_config = kube::Config::new(cluster_url);
    kube_config.auth_info.token = Some(token.to_string().into());
    kube_config.connect_timeout = Some(timeout);
    kube_config.read_timeout = Some(timeout);

    debug!("Connecting to Kubernetes API at {}", base_url);
    Client::try_from(kube_config).map_err(|e| Error::from_kube(e, base_url))
}

/// Plain HTTP client for scrape targets discovered through the API (pod IPs,
/// not the API server), authenticated with the same bearer token.
pub struct ScrapeClient {
    http: reqwest::Client,
}

impl ScrapeClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| Error::InvalidParam {
            name: "KUBE_API_TOKEN".to_string(),
            reason: e.to_string(),
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport {
                url: String::new(),
                source: e,
            })?;

        Ok(Self { http })
    }

    /// GET an absolute URL and return the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("Sending request: {}", url);
        let transport = |e: reqwest::Error| Error::Transport {
            url: url.to_string(),
            source: e,
        };

        let res = self.http.get(url).send().await.map_err(transport)?;
        let status = res.status();
        debug!("Received response with status code {}", status.as_u16());

        let body = res.text().await.map_err(transport)?;
        trace!("{}", body);

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Node;
    use kube::api::{Api, ListParams};

    fn scrape_client() -> ScrapeClient {
        ScrapeClient::new("s3cr3t", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_client_sends_bearer_token() {
        tokio_test::block_on(async {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/api/v1/nodes")
                .match_header("authorization", "Bearer s3cr3t")
                .with_status(200)
                .with_body(r#"{"apiVersion": "v1", "kind": "NodeList", "metadata": {}, "items": []}"#)
                .create_async()
                .await;

            let client = connect_to(&server.url(), "s3cr3t", Duration::from_secs(5)).unwrap();
            let nodes = Api::<Node>::all(client).list(&ListParams::default()).await.unwrap();
            assert!(nodes.items.is_empty());
            mock.assert_async().await;
        });
    }

    #[test]
    fn test_api_status_maps_to_status_error() {
        tokio_test::block_on(async {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/api/v1/nodes")
                .with_status(403)
                .with_body(
                    r#"{"kind": "Status", "apiVersion": "v1", "status": "Failure",
                        "message": "nodes is forbidden", "reason": "Forbidden", "code": 403}"#,
                )
                .create_async()
                .await;

            let client = connect_to(&server.url(), "s3cr3t", Duration::from_secs(5)).unwrap();
            let err = Api::<Node>::all(client)
                .list(&ListParams::default())
                .await
                .map_err(|e| Error::from_kube(e, "nodes"))
                .unwrap_err();

            assert!(err.is_transport());
            assert!(matches!(err, Error::Status { status: 403, .. }));
            assert!(err.to_string().contains("nodes is forbidden"));
        });
    }

    #[test]
    fn test_connect_rejects_bad_url() {
        tokio_test::block_on(async {
            let err = connect_to("not a url", "t", Duration::from_secs(1)).err().unwrap();
            assert!(err.is_configuration());
        });
    }

    #[test]
    fn test_scrape_get_text() {
        tokio_test::block_on(async {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/metrics")
                .match_header("authorization", "Bearer s3cr3t")
                .with_status(200)
                .with_body("kube_node_info 1\n")
                .create_async()
                .await;

            let text = scrape_client()
                .get_text(&format!("{}/metrics", server.url()))
                .await
                .unwrap();
            assert_eq!(text, "kube_node_info 1\n");
        });
    }

    #[test]
    fn test_scrape_non_success_status() {
        tokio_test::block_on(async {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/metrics")
                .with_status(503)
                .with_body("unavailable")
                .create_async()
                .await;

            let err = scrape_client()
                .get_text(&format!("{}/metrics", server.url()))
                .await
                .unwrap_err();
            assert!(err.is_transport());
            assert!(err.to_string().contains("503"));
        });
    }
}
