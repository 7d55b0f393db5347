//! Canonical registry endpoints.

use std::fmt;

use api_client::uri::IntoUri as _;
use http::Uri;

use crate::error::{RegistryError, RegistryResult};

/// The base URI of a registry API, e.g. `https://registry.example.com/v2`.
///
/// Never ends with `/`; any number of trailing separators is stripped on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    raw: String,
    uri: Uri,
}

impl Endpoint {
    /// Canonicalize and validate an endpoint.
    pub fn new(endpoint: &str) -> RegistryResult<Self> {
        let raw = endpoint.trim_end_matches('/');
        if raw.is_empty() {
            return Err(RegistryError::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
                reason: "empty after removing trailing separators".into(),
            });
        }

        let uri = raw
            .into_uri()
            .map_err(|error| RegistryError::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            raw: raw.to_owned(),
            uri,
        })
    }

    /// The endpoint as a string, without trailing separators.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed endpoint.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Endpoint {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn strips_trailing_separators() {
        for n in 0..4 {
            let input = format!("https://registry.example.com/v2{}", "/".repeat(n));
            let endpoint = Endpoint::new(&input).unwrap();
            assert_eq!(endpoint.as_str(), "https://registry.example.com/v2");
        }
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let once = Endpoint::new("http://localhost:5000/v2///").unwrap();
        let twice = Endpoint::new(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_endpoint_is_a_config_error() {
        for input in ["", "/", "////"] {
            let error = Endpoint::new(input).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Config);
        }
    }

    #[test]
    fn unparseable_endpoint_is_a_config_error() {
        let error = Endpoint::new("not a url").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Config);
    }
}
