//! Shared plumbing for HTTP API clients.
//!
//! An [`ApiClient`] pairs a base URI with a shared transport service. Individual
//! service clients wrap it and build requests relative to the base.

use std::future::Future;
use std::time::Duration;

use http::Method;
use http::Uri;
use hyperdriver::service::SharedService;
use tower::ServiceExt;

pub mod error;
pub mod request;
pub mod response;
pub mod uri;

pub use self::error::{Error, HttpResponseError};
pub use self::request::RequestBuilder;
pub use self::response::Response;
use self::uri::UriExtension as _;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod body {
    //! Request and response types carried by the transport.

    /// A request as sent over the transport.
    pub type Request = http::Request<hyperdriver::Body>;

    /// A response as received from the transport.
    pub type Response = http::Response<hyperdriver::Body>;
}

/// The shared transport service behind every [`ApiClient`].
pub type Transport = hyperdriver::client::SharedClientService<hyperdriver::Body, hyperdriver::Body>;

/// A client for accessing APIs over HTTP / HTTPS
///
/// Useful inner object to wrap for individual API clients.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Uri,
    inner: Transport,
    timeout: Option<Duration>,
}

impl ApiClient {
    /// Create a new API Client from a base URL
    pub fn new(base: Uri) -> Self {
        let inner = hyperdriver::Client::build_tcp_http()
            .with_default_tls()
            .build_service();

        ApiClient {
            base,
            inner,
            timeout: None,
        }
    }

    /// Create a new API Client which sends requests through `inner`.
    pub fn new_with_inner_service<S>(base: Uri, inner: S) -> Self
    where
        S: tower::Service<
                body::Request,
                Response = body::Response,
                Error = hyperdriver::client::Error,
            > + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let service = tower::ServiceBuilder::new()
            .layer(SharedService::layer())
            .service(inner);

        ApiClient {
            base,
            inner: service,
            timeout: None,
        }
    }

    /// Set the deadline applied to every request sent by this client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The deadline applied to every request, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The base URI which request paths are joined to.
    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// Join a relative path to the base URI.
    pub fn url(&self, endpoint: &str) -> Result<Uri, http::Error> {
        self.base.clone().join(endpoint)
    }

    /// Build a GET request against an endpoint relative to the base.
    pub fn get(&self, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), self.url(endpoint), Method::GET)
    }

    /// Build a HEAD request against an endpoint relative to the base.
    pub fn head(&self, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), self.url(endpoint), Method::HEAD)
    }

    /// Send a fully constructed request.
    pub async fn execute(&self, req: body::Request) -> Result<Response, Error> {
        let parts = request::parts(&req);

        let response = self.inner.clone().oneshot(req).await?;
        tracing::trace!(uri = %parts.uri, status = %response.status(), "Received response");
        Ok(Response::new(parts, response))
    }
}

pub mod mock {
    //! An in-memory transport for testing API clients.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use http::response;
    use parking_lot::Mutex;

    use crate::BoxFuture;

    /// A canned response.
    #[derive(Debug, Clone)]
    pub struct MockResponse {
        status: http::StatusCode,
        headers: http::HeaderMap,
        body: Vec<u8>,
    }

    impl MockResponse {
        /// Create a new canned response.
        pub fn new(status: http::StatusCode, headers: http::HeaderMap, body: Vec<u8>) -> Self {
            Self {
                status,
                headers,
                body,
            }
        }
    }

    #[derive(Debug, Clone)]
    enum MockOutcome {
        Respond(MockResponse),
        Fail,
    }

    #[derive(Debug, Clone)]
    struct MockRoute {
        outcome: MockOutcome,
        delay: Option<Duration>,
    }

    /// Counts requests which are currently being answered.
    #[derive(Debug, Default)]
    struct InFlight {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl InFlight {
        fn enter(self: &Arc<Self>) -> InFlightGuard {
            let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(current, Ordering::SeqCst);
            InFlightGuard(self.clone())
        }
    }

    #[derive(Debug)]
    struct InFlightGuard(Arc<InFlight>);

    impl Drop for InFlightGuard {
        fn drop(&mut self) {
            self.0.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// A transport which answers requests by path from a table of canned responses.
    ///
    /// Paths without a configured response answer `404 Not Found`.
    #[derive(Debug, Default, Clone)]
    pub struct MockService {
        routes: HashMap<String, MockRoute>,
        requests: Arc<Mutex<Vec<(http::Method, String)>>>,
        in_flight: Arc<InFlight>,
    }

    impl MockService {
        /// Create an empty mock service.
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond to requests for `path`.
        pub fn add(
            &mut self,
            path: &str,
            status: http::StatusCode,
            headers: http::HeaderMap,
            body: Vec<u8>,
        ) {
            let response = MockResponse::new(status, headers, body);
            self.routes.insert(
                path.to_owned(),
                MockRoute {
                    outcome: MockOutcome::Respond(response),
                    delay: None,
                },
            );
        }

        /// Fail requests for `path` with a transport error.
        pub fn add_error(&mut self, path: &str) {
            self.routes.insert(
                path.to_owned(),
                MockRoute {
                    outcome: MockOutcome::Fail,
                    delay: None,
                },
            );
        }

        /// Delay the outcome for `path`, which must already be configured.
        pub fn delay(&mut self, path: &str, delay: Duration) {
            if let Some(route) = self.routes.get_mut(path) {
                route.delay = Some(delay);
            }
        }

        /// Requests seen so far, as method and path, in arrival order.
        pub fn requests(&self) -> Vec<(http::Method, String)> {
            self.requests.lock().clone()
        }

        /// The largest number of requests which were being answered at the same time.
        pub fn max_in_flight(&self) -> usize {
            self.in_flight.max.load(Ordering::SeqCst)
        }
    }

    impl tower::Service<crate::body::Request> for MockService {
        type Response = crate::body::Response;
        type Error = hyperdriver::client::Error;
        type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

        fn poll_ready(
            &mut self,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: crate::body::Request) -> Self::Future {
            let path = req.uri().path().to_owned();
            self.requests
                .lock()
                .push((req.method().clone(), path.clone()));

            let route = self.routes.get(&path).cloned();
            let in_flight = self.in_flight.clone();

            Box::pin(async move {
                let _guard = in_flight.enter();

                let Some(route) = route else {
                    tracing::warn!("No response configured for path: {path}");
                    let response = response::Builder::new()
                        .status(http::StatusCode::NOT_FOUND)
                        .body(hyperdriver::Body::empty())
                        .unwrap();
                    return Ok(response);
                };

                if let Some(delay) = route.delay {
                    tokio::time::sleep(delay).await;
                }

                let response = match route.outcome {
                    MockOutcome::Respond(response) => response,
                    MockOutcome::Fail => return Err(hyperdriver::client::Error::RequestTimeout),
                };

                let mut builder = response::Builder::new()
                    .status(response.status)
                    .version(http::Version::HTTP_11);

                for (key, value) in response.headers.iter() {
                    builder = builder.header(key, value);
                }

                let response = builder
                    .body(hyperdriver::Body::from(Bytes::from(response.body)))
                    .unwrap();

                Ok(response)
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Greeting {
        greeting: String,
    }

    #[test]
    fn extensions_produce_send_futures() {
        let client = ApiClient::new("http://httpbin.org/get/".parse().unwrap());
        let builder = client.get("frobulator");

        fn assert_send<T: Send>(_t: T) {}

        let fut = builder.send();
        assert_send(fut);
    }

    #[tokio::test]
    async fn mock_client_works() {
        let mut mock = crate::mock::MockService::new();
        mock.add(
            "/get/frobulator",
            http::StatusCode::OK,
            http::HeaderMap::new(),
            br#"{"greeting": "hello"}"#.to_vec(),
        );

        let client =
            ApiClient::new_with_inner_service("http://httpbin.org/get".parse().unwrap(), mock.clone());

        let response = client.get("frobulator").send().await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        let greeting: Greeting = response.json().await.unwrap();
        assert_eq!(greeting.greeting, "hello");

        assert_eq!(
            mock.requests(),
            vec![(http::Method::GET, "/get/frobulator".to_owned())]
        );
    }

    #[tokio::test]
    async fn mock_unknown_path_is_not_found() {
        let mock = crate::mock::MockService::new();
        let client =
            ApiClient::new_with_inner_service("http://httpbin.org/".parse().unwrap(), mock);

        let response = client.head("missing").send().await.unwrap();
        let error = response.error_for_status().await.unwrap_err();
        assert_eq!(error.status, http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mock_errors_are_transport_errors() {
        let mut mock = crate::mock::MockService::new();
        mock.add_error("/broken");
        let client =
            ApiClient::new_with_inner_service("http://httpbin.org/".parse().unwrap(), mock);

        let error = client.get("broken").send().await.unwrap_err();
        assert!(error.is_transport());
    }

    #[tokio::test]
    async fn requests_past_their_deadline_time_out() {
        let mut mock = crate::mock::MockService::new();
        mock.add(
            "/slow",
            http::StatusCode::OK,
            http::HeaderMap::new(),
            Vec::new(),
        );
        mock.delay("/slow", Duration::from_secs(5));
        let client = ApiClient::new_with_inner_service("http://httpbin.org/".parse().unwrap(), mock)
            .with_timeout(Duration::from_millis(10));

        let error = client.get("slow").send().await.unwrap_err();
        assert!(matches!(error, Error::Timeout(_)));
        assert!(error.is_transport());
    }

    #[tokio::test]
    async fn mock_tracks_overlapping_requests() {
        let mut mock = crate::mock::MockService::new();
        for path in ["/a", "/b"] {
            mock.add(path, http::StatusCode::OK, http::HeaderMap::new(), Vec::new());
            mock.delay(path, Duration::from_millis(20));
        }
        let client = ApiClient::new_with_inner_service("http://httpbin.org/".parse().unwrap(), mock.clone());

        client.get("a").send().await.unwrap();
        client.get("b").send().await.unwrap();
        assert_eq!(mock.max_in_flight(), 1);

        let (a, b) = tokio::join!(client.get("a").send(), client.get("b").send());
        a.unwrap();
        b.unwrap();
        assert_eq!(mock.max_in_flight(), 2);
    }
}
