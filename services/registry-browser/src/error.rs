//! Error types for registry operations

use http::StatusCode;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Broad classification of a [`RegistryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The client was configured with an unusable endpoint or setting.
    Config,
    /// No response was received, or it broke off before the body was complete.
    Transport,
    /// A response was received, but its body or headers had the wrong shape.
    Decode,
    /// The registry does not know the named repository, tag or blob.
    NotFound,
    /// The registry answered with some other non-success status.
    Status,
}

/// Error types for registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Invalid registry endpoint
    #[error("invalid registry endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The endpoint as supplied
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid configuration value
    #[error("invalid configuration for {key}: {reason}")]
    Config {
        /// Name of the setting
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// A repository name, reference or digest cannot be used in a request path
    #[error("invalid {what} {name:?}: {reason}")]
    InvalidName {
        /// Which kind of name was rejected
        what: &'static str,
        /// The name as supplied
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(#[source] api_client::Error),

    /// Request could not be sent, or the response broke off
    #[error("request failed: {0}")]
    Transport(#[source] api_client::Error),

    /// Response body was not the expected JSON document
    #[error("decoding {what}: {source}")]
    Decode {
        /// What was being decoded
        what: &'static str,
        /// The underlying decoding error
        #[source]
        source: api_client::Error,
    },

    /// A history entry's v1Compatibility string was not a valid record
    #[error("decoding history entry {index}: {source}")]
    History {
        /// Index of the history entry in the manifest
        index: usize,
        /// The underlying decoding error
        #[source]
        source: serde_json::Error,
    },

    /// The registry returned a manifest with an unknown schema version
    #[error("unsupported manifest schema version {0}")]
    UnsupportedSchema(u32),

    /// A response header was missing or malformed
    #[error("header {header} on {uri}: {reason}")]
    Header {
        /// Header name
        header: &'static str,
        /// URI of the request
        uri: http::Uri,
        /// What was wrong with it
        reason: String,
    },

    /// The size of one filesystem layer could not be determined
    #[error("probing size of layer {digest}: {source}")]
    LayerSize {
        /// Digest of the layer
        digest: String,
        /// Why the probe failed
        #[source]
        source: Box<RegistryError>,
    },

    /// Repository, tag or blob not found
    #[error("not found: {uri}")]
    NotFound {
        /// URI of the missing resource
        uri: http::Uri,
    },

    /// Any other non-success response
    #[error(transparent)]
    Status(api_client::HttpResponseError),
}

impl RegistryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::InvalidEndpoint { .. }
            | RegistryError::Config { .. }
            | RegistryError::InvalidName { .. }
            | RegistryError::InvalidRequest(_) => ErrorKind::Config,
            RegistryError::Transport(_) => ErrorKind::Transport,
            RegistryError::Decode { .. }
            | RegistryError::History { .. }
            | RegistryError::UnsupportedSchema(_)
            | RegistryError::Header { .. }
            | RegistryError::LayerSize { .. } => ErrorKind::Decode,
            RegistryError::NotFound { .. } => ErrorKind::NotFound,
            RegistryError::Status(_) => ErrorKind::Status,
        }
    }

    /// Build a decode error for a response body.
    pub(crate) fn decode(what: &'static str) -> impl FnOnce(api_client::Error) -> Self {
        move |source| match source {
            api_client::Error::Json(_) => RegistryError::Decode { what, source },
            source => source.into(),
        }
    }
}

impl From<api_client::Error> for RegistryError {
    fn from(error: api_client::Error) -> Self {
        match error {
            api_client::Error::Response(response) if response.status == StatusCode::NOT_FOUND => {
                RegistryError::NotFound { uri: response.uri }
            }
            api_client::Error::Response(response) => RegistryError::Status(response),
            error @ api_client::Error::InvalidRequest(_) => RegistryError::InvalidRequest(error),
            error => RegistryError::Transport(error),
        }
    }
}

impl From<api_client::HttpResponseError> for RegistryError {
    fn from(error: api_client::HttpResponseError) -> Self {
        api_client::Error::Response(error).into()
    }
}
