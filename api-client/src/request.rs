//! Request construction for [`ApiClient`].

use std::time::Duration;

use http::{header::HeaderValue, HeaderName, Uri};

use crate::error::Error;
use crate::response::{Deadline, Response};
use crate::ApiClient;

/// Extract the parts of a request without consuming its body.
pub(crate) fn parts<B>(req: &http::Request<B>) -> http::request::Parts {
    let (mut parts, _) = http::Request::new(()).into_parts();
    parts.method = req.method().clone();
    parts.uri = req.uri().clone();
    parts.version = req.version();
    parts.headers = req.headers().clone();
    parts
}

/// Builder for a single request against an [`ApiClient`].
#[derive(Debug)]
pub struct RequestBuilder {
    req: http::request::Builder,
    uri: Result<Uri, http::Error>,
    client: ApiClient,
    timeout: Option<Duration>,
}

impl RequestBuilder {
    /// Create a new request builder. URI errors are reported by [`RequestBuilder::send`].
    pub fn new(client: ApiClient, uri: Result<Uri, http::Error>, method: http::Method) -> Self {
        let timeout = client.timeout();
        Self {
            req: http::Request::builder().method(method),
            uri,
            client,
            timeout,
        }
    }

    /// Add a header to the request.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.req = self.req.header(key, value);
        self
    }

    /// Override the client's deadline for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send the request.
    ///
    /// The deadline starts now and also bounds reading the response body.
    pub async fn send(self) -> Result<Response, Error> {
        let uri = self.uri?;
        let req = self.req.uri(uri).body(hyperdriver::Body::empty())?;

        tracing::debug!(method = %req.method(), uri = %req.uri(), "Sending request");

        let Some(deadline) = self.timeout.map(Deadline::after) else {
            return self.client.execute(req).await;
        };

        match tokio::time::timeout_at(deadline.at(), self.client.execute(req)).await {
            Ok(res) => res.map(|response| response.with_deadline(deadline)),
            Err(_) => Err(deadline.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_keep_method_uri_and_headers() {
        let req = http::Request::head("http://example.com/v2/")
            .header("accept", "application/json")
            .body(())
            .unwrap();

        let parts = parts(&req);
        assert_eq!(parts.method, http::Method::HEAD);
        assert_eq!(parts.uri, "http://example.com/v2/");
        assert_eq!(parts.headers["accept"], "application/json");
    }
}
