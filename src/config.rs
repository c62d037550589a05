use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::parsing::parse_api_url;
use crate::types::{Config, ScrapeTarget};

pub const DEFAULT_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where `KUBE_*` settings are read from.
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;

    /// Trimmed value of `key`; blank counts as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.get_var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// The process environment.
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed set of variables, for tests and embedding callers.
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let api_url = required(env, "KUBE_API_URL")?;
    let api_url = parse_api_url(&api_url)?;
    let api_token = required(env, "KUBE_API_TOKEN")?;

    let page_size: u32 = numeric(env, "KUBE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
    if page_size == 0 {
        return Err(Error::InvalidParam {
            name: "KUBE_PAGE_SIZE".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(Config {
        api_url,
        api_token,
        endpoint_name: env.non_empty("KUBE_ENDPOINT_NAME"),
        state_endpoint_name: env.non_empty("KUBE_STATE_ENDPOINT_NAME"),
        state_endpoint_namespace: env.non_empty("KUBE_STATE_ENDPOINT_NAMESPACE"),
        page_size,
        request_timeout_secs: numeric(env, "KUBE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
        node_filter_labels: env.get_var("KUBE_NODE_FILTER_LABELS").unwrap_or_default(),
        node_filter_annotations: env.get_var("KUBE_NODE_FILTER_ANNOTATIONS").unwrap_or_default(),
        pod_filter_labels: env.get_var("KUBE_POD_FILTER_LABELS").unwrap_or_default(),
        pod_filter_annotations: env.get_var("KUBE_POD_FILTER_ANNOTATIONS").unwrap_or_default(),
        api_server: target(env, "KUBE_API_SERVER", 6443)?,
        controller: target(env, "KUBE_CONTROLLER", 10257)?,
        scheduler: target(env, "KUBE_SCHEDULER", 10259)?,
        kubelet: target(env, "KUBE_KUBELET", 10250)?,
    })
}

fn required<E: EnvironmentProvider>(env: &E, key: &str) -> Result<String> {
    env.non_empty(key).ok_or_else(|| Error::Configuration(key.to_string()))
}

fn numeric<E, T>(env: &E, key: &str, default: T) -> Result<T>
where
    E: EnvironmentProvider,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env.non_empty(key) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| Error::InvalidParam {
            name: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn target<E: EnvironmentProvider>(env: &E, prefix: &str, default_port: u16) -> Result<ScrapeTarget> {
    let scheme = env.non_empty(&format!("{}_SCHEME", prefix)).unwrap_or_else(|| "https".to_string());
    let port = numeric(env, &format!("{}_PORT", prefix), default_port)?;
    Ok(ScrapeTarget::new(scheme, port))
}
