//! Response types for working with HTTP responses.

use std::time::Duration;

use bytes::Bytes;
use http::header::AsHeaderName;
use http_body_util::BodyExt as _;
use hyperdriver::Body;
use tokio::time::Instant;

use crate::error::{Error, HttpResponseError};

/// The point in time by which a request and its response body must be complete.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    pub(crate) fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    pub(crate) fn at(&self) -> Instant {
        self.at
    }

    pub(crate) fn elapsed(&self) -> Error {
        Error::Timeout(self.timeout)
    }
}

/// Collect a body, giving up once `deadline` passes.
async fn collect<B>(body: B, deadline: Option<Deadline>) -> Result<Bytes, Error>
where
    B: http_body::Body,
    B::Error: Into<crate::error::BoxError>,
{
    let collect = body.collect();
    let collected = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at(), collect)
            .await
            .map_err(|_| deadline.elapsed())?,
        None => collect.await,
    };

    collected
        .map(|collected| collected.to_bytes())
        .map_err(|error| Error::ResponseBody(error.into()))
}

/// Wrapper around an HTTP response that provides additional methods for working with the response,
/// and allows for easy access to the response and request parts.
#[derive(Debug)]
pub struct Response {
    request: http::request::Parts,
    response: http::response::Parts,
    body: Body,
    deadline: Option<Deadline>,
}

impl Response {
    /// Create a new `Response` instance.
    pub fn new(request: http::request::Parts, response: http::Response<Body>) -> Self {
        let (response, body) = response.into_parts();

        Self {
            request,
            response,
            body,
            deadline: None,
        }
    }

    /// Bound reading the body by the deadline of the request.
    pub(crate) fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Get the status code of the response.
    pub fn status(&self) -> http::StatusCode {
        self.response.status
    }

    /// Get the headers of the response.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.response.headers
    }

    /// Get a header as a string, if present and valid visible ASCII.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.response
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// Get the URI of the request that generated the response.
    pub fn uri(&self) -> &http::Uri {
        &self.request.uri
    }

    /// Get the method of the request that generated the response.
    pub fn method(&self) -> &http::Method {
        &self.request.method
    }

    /// Get the parts of the request that generated the response.
    pub fn request(&self) -> &http::request::Parts {
        &self.request
    }

    /// Collect the response body into a `Bytes` instance.
    ///
    /// Fails with [`Error::Timeout`] if the request deadline passes first.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        collect(self.body, self.deadline).await
    }

    /// Collect the response body into a `String`, replacing invalid UTF-8.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Collect the body and deserialize it as JSON.
    pub async fn json<T>(self) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let uri = self.request.uri.clone();
        let bytes = self.bytes().await?;
        tracing::trace!(%uri, "Decoding {} byte JSON body", bytes.len());
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Convert the `Response` into an `HttpResponseError` instance.
    pub async fn into_error(self) -> HttpResponseError {
        HttpResponseError::from_response(self).await
    }

    /// Convert the `Response` into an `HttpResponseError` instance if the response status is not a success status.
    pub async fn error_for_status(self) -> Result<Self, HttpResponseError> {
        if self.status().is_success() {
            Ok(self)
        } else {
            Err(self.into_error().await)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use http_body::Frame;
    use http_body_util::{Full, StreamBody};

    use super::*;

    #[tokio::test]
    async fn stalled_bodies_time_out() {
        let stalled = StreamBody::new(futures::stream::pending::<Result<Frame<Bytes>, Infallible>>());
        let deadline = Deadline::after(Duration::from_millis(10));

        let error = collect(stalled, Some(deadline)).await.unwrap_err();
        assert!(matches!(error, Error::Timeout(timeout) if timeout == Duration::from_millis(10)));
        assert!(error.is_transport());
    }

    #[tokio::test]
    async fn complete_bodies_are_collected_before_the_deadline() {
        let body = Full::new(Bytes::from_static(b"{}"));
        let deadline = Deadline::after(Duration::from_secs(5));

        let bytes = collect(body, Some(deadline)).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn deadline_carries_over_from_the_request() {
        let request = http::Request::get("http://example.com/v2/")
            .body(())
            .unwrap();
        let response = http::Response::new(Body::from("{}"));
        let response = Response::new(crate::request::parts(&request), response)
            .with_deadline(Deadline::after(Duration::from_secs(5)));

        assert!(response.deadline.is_some());
        assert_eq!(response.text().await.unwrap(), "{}");
    }
}
