use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{EndpointAddress, EndpointSubset, Endpoints};
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::debug;

use crate::error::{MetricsEndpointError, Result};
use crate::parsing::scrape_url;

/// Port names a metrics endpoint may be served under, mapped to the scheme.
const METRICS_PORTS: &[(&str, &str)] = &[("http", "http"), ("https", "https"), ("https-main", "https")];

fn ready_addresses(subset: &EndpointSubset) -> Option<&[EndpointAddress]> {
    subset
        .addresses
        .as_deref()
        .filter(|addresses| !addresses.is_empty())
}

fn name_of(ep: &Endpoints) -> &str {
    ep.metadata.name.as_deref().unwrap_or_default()
}

/// Every ready address of every Endpoints object called `name`.
pub fn endpoint_ips(endpoints: &[Endpoints], name: &str) -> BTreeSet<String> {
    endpoints
        .iter()
        .filter(|ep| name_of(ep) == name)
        .flat_map(|ep| ep.subsets.iter().flatten())
        .filter_map(ready_addresses)
        .flatten()
        .map(|addr| addr.ip.clone())
        .collect()
}

/// Base URL (`scheme://host:port`) of the service behind the Endpoints object
/// `name`. When a subset has several ready addresses one is picked at random.
pub fn resolve_metrics_url(endpoints: &[Endpoints], name: &str) -> Result<String> {
    resolve_metrics_url_with(endpoints, name, &mut rand::rng())
}

pub fn resolve_metrics_url_with<R: Rng + ?Sized>(endpoints: &[Endpoints], name: &str, rng: &mut R) -> Result<String> {
    let named: Vec<&Endpoints> = endpoints.iter().filter(|ep| name_of(ep) == name).collect();
    if named.is_empty() {
        return Err(MetricsEndpointError::NotFound { name: name.to_string() }.into());
    }

    let unusable = |reason: &str| MetricsEndpointError::Unusable {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let ready: Vec<(&EndpointSubset, &[EndpointAddress])> = named
        .iter()
        .flat_map(|ep| ep.subsets.iter().flatten())
        .filter_map(|subset| ready_addresses(subset).map(|addresses| (subset, addresses)))
        .collect();
    if ready.is_empty() {
        return Err(unusable("no subset has ready addresses").into());
    }

    for (subset, addresses) in ready {
        let port = subset.ports.iter().flatten().find_map(|port| {
            let port_name = port.name.as_deref()?;
            METRICS_PORTS
                .iter()
                .find(|(n, _)| *n == port_name)
                .map(|(_, scheme)| (*scheme, port.port))
        });

        if let Some((scheme, port)) = port {
            // A ready subset always has at least one address.
            let Some(addr) = addresses.choose(rng) else {
                continue;
            };
            let url = scrape_url(scheme, &addr.ip, port);
            debug!("Resolved metrics endpoint \"{}\" to {}", name, url);
            return Ok(url);
        }
    }

    Err(unusable("no port named http, https or https-main").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use k8s_openapi::api::core::v1::EndpointPort;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn address(ip: &str) -> EndpointAddress {
        EndpointAddress {
            ip: ip.to_string(),
            ..Default::default()
        }
    }

    fn port(name: &str, port: i32) -> EndpointPort {
        EndpointPort {
            name: Some(name.to_string()),
            port,
            ..Default::default()
        }
    }

    fn endpoints(name: &str, subsets: Vec<EndpointSubset>) -> Endpoints {
        Endpoints {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            subsets: Some(subsets),
        }
    }

    fn subset(ips: &[&str], ports: Vec<EndpointPort>) -> EndpointSubset {
        EndpointSubset {
            addresses: Some(ips.iter().map(|ip| address(ip)).collect()),
            ports: Some(ports),
            ..Default::default()
        }
    }

    fn metrics_error(err: Error) -> MetricsEndpointError {
        match err {
            Error::MetricsEndpoint(e) => e,
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_endpoint_ips() {
        let list = vec![
            endpoints("agent", vec![
                subset(&["10.0.0.1", "10.0.0.2"], vec![]),
                EndpointSubset {
                    not_ready_addresses: Some(vec![address("10.0.0.9")]),
                    ..Default::default()
                },
            ]),
            endpoints("other", vec![subset(&["10.0.0.3"], vec![])]),
            endpoints("agent", vec![subset(&["10.0.0.4"], vec![])]),
        ];

        let ips = endpoint_ips(&list, "agent");
        let expected: BTreeSet<String> = ["10.0.0.1", "10.0.0.2", "10.0.0.4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ips, expected);

        assert!(endpoint_ips(&list, "missing").is_empty());
    }

    #[test]
    fn test_resolve_single_address() {
        let list = vec![endpoints("kube-state-metrics", vec![subset(
            &["10.1.2.3"],
            vec![port("telemetry", 8081), port("http", 8080)],
        )])];

        let url = resolve_metrics_url(&list, "kube-state-metrics").unwrap();
        assert_eq!(url, "http://10.1.2.3:8080");
    }

    #[test]
    fn test_resolve_https_main_and_ipv6() {
        let list = vec![endpoints("ksm", vec![subset(&["fd00::7"], vec![port("https-main", 8443)])])];

        let url = resolve_metrics_url(&list, "ksm").unwrap();
        assert_eq!(url, "https://[fd00::7]:8443");
    }

    #[test]
    fn test_resolve_picks_one_of_the_ready_addresses() {
        let ips = ["10.0.0.1", "10.0.0.2", "10.0.0.3"];
        let list = vec![endpoints("ksm", vec![subset(&ips, vec![port("http", 8080)])])];
        let candidates: Vec<String> = ips.iter().map(|ip| format!("http://{}:8080", ip)).collect();

        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..20 {
            let url = resolve_metrics_url_with(&list, "ksm", &mut rng).unwrap();
            assert!(candidates.contains(&url), "unexpected {}", url);
        }
    }

    #[test]
    fn test_resolve_skips_unready_subsets() {
        let list = vec![endpoints("ksm", vec![
            EndpointSubset {
                addresses: None,
                not_ready_addresses: Some(vec![address("10.0.0.8")]),
                ports: Some(vec![port("http", 8080)]),
            },
            subset(&["10.0.0.9"], vec![port("https", 8443)]),
        ])];

        assert_eq!(resolve_metrics_url(&list, "ksm").unwrap(), "https://10.0.0.9:8443");
    }

    #[test]
    fn test_resolve_not_found() {
        let list = vec![endpoints("other", vec![subset(&["10.0.0.1"], vec![port("http", 80)])])];

        let err = metrics_error(resolve_metrics_url(&list, "ksm").unwrap_err());
        assert_eq!(err, MetricsEndpointError::NotFound { name: "ksm".to_string() });
    }

    #[test]
    fn test_resolve_found_but_unusable() {
        // No ready addresses at all
        let list = vec![endpoints("ksm", vec![EndpointSubset {
            ports: Some(vec![port("http", 8080)]),
            ..Default::default()
        }])];
        let err = metrics_error(resolve_metrics_url(&list, "ksm").unwrap_err());
        assert!(matches!(err, MetricsEndpointError::Unusable { .. }));

        // Ready, but no recognized port name
        let list = vec![endpoints("ksm", vec![subset(&["10.0.0.1"], vec![port("metrics", 9100)])])];
        let err = metrics_error(resolve_metrics_url(&list, "ksm").unwrap_err());
        match err {
            MetricsEndpointError::Unusable { reason, .. } => assert!(reason.contains("https-main")),
            other => panic!("unexpected {:?}", other),
        }

        // No subsets
        let list = vec![Endpoints {
            metadata: ObjectMeta {
                name: Some("ksm".to_string()),
                ..Default::default()
            },
            subsets: None,
        }];
        let err = metrics_error(resolve_metrics_url(&list, "ksm").unwrap_err());
        assert!(matches!(err, MetricsEndpointError::Unusable { .. }));
    }
}
