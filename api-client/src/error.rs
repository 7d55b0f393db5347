//! Error types for API Clients
use std::fmt;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::response::Response;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error occured while sending or recieving an HTTP request
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be constructed (usually an invalid URI)
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] http::Error),

    /// An error occured while sending the request
    #[error(transparent)]
    Request(hyperdriver::client::Error),

    /// No response arrived before the request deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// An HTTP response error occured
    #[error(transparent)]
    Response(HttpResponseError),

    /// The response body could not be read to the end
    #[error("Error reading response body: {0}")]
    ResponseBody(#[source] BoxError),

    /// The response body was not the expected JSON document
    #[error("Error decoding response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the exchange with the server broke off before a complete response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Request(_) | Error::Timeout(_) | Error::ResponseBody(_)
        )
    }

    /// The status of the response that caused this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Response(error) => Some(error.status),
            _ => None,
        }
    }
}

impl From<hyperdriver::client::Error> for Error {
    fn from(error: hyperdriver::client::Error) -> Self {
        Error::Request(error)
    }
}

impl From<HttpResponseError> for Error {
    fn from(error: HttpResponseError) -> Self {
        Error::Response(error)
    }
}

/// A server returned an error response
#[derive(Debug, Clone)]
pub struct HttpResponseError {
    /// The HTTP status code of the response
    pub status: StatusCode,

    /// The URI which produced the response
    pub uri: http::Uri,

    /// The message body of the response
    pub message: String,
}

impl HttpResponseError {
    /// Create a new HTTP response error from a response
    pub async fn from_response(response: Response) -> Self {
        let status = response.status();
        let uri = response.uri().clone();
        let message = response
            .text()
            .await
            .unwrap_or_else(|err| format!("Failed to read response body: {}", err));

        Self {
            status,
            uri,
            message,
        }
    }
}

impl fmt::Display for HttpResponseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP {} response from {}", self.status, self.uri)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpResponseError {}
