//! Registry client configuration, from code or the environment.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{RegistryError, RegistryResult};

/// Environment variable holding the registry endpoint.
pub const ENDPOINT_VAR: &str = "REGISTRY_API";
/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_VAR: &str = "REGISTRY_API_TIMEOUT";
/// Environment variable holding the maximum number of concurrent layer probes.
pub const PROBE_CONCURRENCY_VAR: &str = "REGISTRY_API_PROBE_CONCURRENCY";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_PROBE_CONCURRENCY: usize = 8;

/// Registry client configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryConfig {
    /// Base URI of the registry API, e.g. `https://registry.example.com/v2`
    pub endpoint: String,

    /// Per-request deadline in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum number of layer size probes in flight for one manifest
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: NonZeroUsize,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_probe_concurrency() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_PROBE_CONCURRENCY).unwrap_or(NonZeroUsize::MIN)
}

impl RegistryConfig {
    /// Configuration for `endpoint` with default limits.
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: default_timeout(),
            probe_concurrency: default_probe_concurrency(),
        }
    }

    /// Read the configuration from the environment.
    pub fn from_env() -> RegistryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> RegistryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENDPOINT_VAR).ok_or(RegistryError::Config {
            key: ENDPOINT_VAR,
            reason: "not set".into(),
        })?;
        let mut config = Self::new(endpoint);

        if let Some(timeout) = lookup(TIMEOUT_VAR) {
            config.timeout = timeout.parse().map_err(|err| RegistryError::Config {
                key: TIMEOUT_VAR,
                reason: format!("{timeout:?}: {err}"),
            })?;
        }

        if let Some(concurrency) = lookup(PROBE_CONCURRENCY_VAR) {
            config.probe_concurrency =
                concurrency.parse().map_err(|err| RegistryError::Config {
                    key: PROBE_CONCURRENCY_VAR,
                    reason: format!("{concurrency:?}: {err}"),
                })?;
        }

        Ok(config)
    }

    /// Per-request deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::ErrorKind;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{"endpoint": "http://localhost:5000/v2"}"#).unwrap();
        assert_eq!(config, RegistryConfig::new("http://localhost:5000/v2"));
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.probe_concurrency.get(), 8);
    }

    #[test]
    fn from_environment() {
        let config = RegistryConfig::from_lookup(lookup(&[
            (ENDPOINT_VAR, "http://localhost:5000/v2/"),
            (TIMEOUT_VAR, "5"),
            (PROBE_CONCURRENCY_VAR, "2"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "http://localhost:5000/v2/");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.probe_concurrency.get(), 2);
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        let error = RegistryConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let error = RegistryConfig::from_lookup(lookup(&[
            (ENDPOINT_VAR, "http://localhost:5000/v2"),
            (PROBE_CONCURRENCY_VAR, "0"),
        ]))
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Config);
    }
}
