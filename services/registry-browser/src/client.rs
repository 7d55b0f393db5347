//! Read-only client for the registry HTTP API.

use std::num::NonZeroUsize;

use api_client::uri::encode_path;
use api_client::ApiClient;
use futures::{stream, StreamExt as _, TryStreamExt as _};
use http::header;
use serde::de::DeserializeOwned;

use crate::config::RegistryConfig;
use crate::endpoint::Endpoint;
use crate::error::{RegistryError, RegistryResult};
use crate::models::manifest::{
    manifest_accept, ImageConfig, ImageManifest, ManifestVersion, RawFsLayer, SignedManifest,
};
use crate::models::{Catalog, FsLayer, Manifest, TagList};

const API_VERSION_HEADER: &str = "docker-distribution-api-version";
const API_VERSION: &str = "registry/2.0";

/// Client for a registry's read API.
///
/// Holds nothing but the endpoint and transport between calls, so it can be
/// cloned freely and shared between tasks.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    endpoint: Endpoint,
    inner: ApiClient,
    probe_concurrency: NonZeroUsize,
}

impl RegistryClient {
    /// Create a client for `endpoint` with default limits.
    pub fn new(endpoint: &str) -> RegistryResult<Self> {
        Self::from_config(&RegistryConfig::new(endpoint))
    }

    /// Create a client from configuration.
    pub fn from_config(config: &RegistryConfig) -> RegistryResult<Self> {
        let endpoint = Endpoint::new(&config.endpoint)?;
        let inner = ApiClient::new(endpoint.uri().clone()).with_timeout(config.timeout());
        Ok(Self::from_parts(endpoint, inner, config))
    }

    /// Create a client which sends requests through `transport`.
    pub fn with_transport<S>(config: &RegistryConfig, transport: S) -> RegistryResult<Self>
    where
        S: tower::Service<
                api_client::body::Request,
                Response = api_client::body::Response,
                Error = hyperdriver::client::Error,
            > + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let endpoint = Endpoint::new(&config.endpoint)?;
        let inner = ApiClient::new_with_inner_service(endpoint.uri().clone(), transport)
            .with_timeout(config.timeout());
        Ok(Self::from_parts(endpoint, inner, config))
    }

    fn from_parts(endpoint: Endpoint, inner: ApiClient, config: &RegistryConfig) -> Self {
        Self {
            endpoint,
            inner,
            probe_concurrency: config.probe_concurrency,
        }
    }

    /// The canonical endpoint this client talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Check whether the endpoint speaks the registry v2 API.
    ///
    /// Only the `Docker-Distribution-API-Version` header is inspected, so an
    /// endpoint which answers `401 Unauthorized` with the header still counts.
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn probe_api_version(&self) -> RegistryResult<bool> {
        let response = self.inner.get("").send().await?;
        let supported = response.header(API_VERSION_HEADER) == Some(API_VERSION);
        tracing::debug!(supported, status = %response.status(), "Probed API version");
        Ok(supported)
    }

    /// List repositories in the registry.
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn list_repositories(&self) -> RegistryResult<Catalog> {
        let catalog: Catalog = self.get_json("_catalog", "catalog").await?;
        tracing::debug!("Found {} repositories", catalog.repositories.len());
        Ok(catalog)
    }

    /// List tags of a repository.
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn list_tags(&self, repository: &str) -> RegistryResult<TagList> {
        let path = format!("{}/tags/list", name_path("repository", repository)?);
        let tags: TagList = self.get_json(&path, "tag list").await?;
        tracing::debug!("Found {} tags", tags.tags.len());
        Ok(tags)
    }

    /// Fetch a manifest by tag or digest and normalize it.
    ///
    /// Schema 1 manifests have their history decoded and every layer's size
    /// probed with a `HEAD` request; the first failure fails the whole call.
    /// Schema 2 manifests carry layer sizes, and their history is taken from
    /// the image configuration blob.
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn get_manifest(&self, repository: &str, reference: &str) -> RegistryResult<Manifest> {
        let path = format!(
            "{}/manifests/{}",
            name_path("repository", repository)?,
            name_path("reference", reference)?
        );
        let body = self
            .inner
            .get(&path)
            .header(header::ACCEPT, manifest_accept())
            .send()
            .await?
            .error_for_status()
            .await?
            .bytes()
            .await
            .map_err(RegistryError::decode("manifest"))?;

        let version: ManifestVersion = decode_json("manifest", &body)?;
        tracing::debug!(schema = version.schema_version, "Fetched manifest");

        match version.schema_version {
            1 => self.signed_manifest(repository, &body).await,
            2 => self.image_manifest(repository, reference, &body).await,
            other => Err(RegistryError::UnsupportedSchema(other)),
        }
    }

    async fn signed_manifest(&self, repository: &str, body: &[u8]) -> RegistryResult<Manifest> {
        let raw: SignedManifest = decode_json("manifest", body)?;
        let history = raw.decode_history()?;
        let fs_layers = self.probe_layers(repository, &raw.fs_layers).await?;

        Ok(Manifest {
            schema_version: raw.schema_version,
            name: raw.name,
            tag: raw.tag,
            architecture: raw.architecture,
            fs_layers,
            history,
            signatures: raw.signatures,
        })
    }

    async fn image_manifest(
        &self,
        repository: &str,
        reference: &str,
        body: &[u8],
    ) -> RegistryResult<Manifest> {
        let raw: ImageManifest = decode_json("manifest", body)?;
        let config: ImageConfig = self
            .get_json(&blob_path(repository, &raw.config.digest)?, "image config")
            .await?;

        // Schema 2 lists the base layer first.
        let fs_layers: Vec<FsLayer> = raw
            .layers
            .iter()
            .rev()
            .map(|descriptor| FsLayer {
                blob_sum: descriptor.digest.clone(),
                blob_size: Some(descriptor.size),
                blob_path: self.blob_url(repository, &descriptor.digest),
            })
            .collect();

        let digests: Vec<&str> = fs_layers.iter().map(|layer| layer.blob_sum.as_str()).collect();
        let history = config.history_for(&digests);

        Ok(Manifest {
            schema_version: 2,
            name: repository.to_owned(),
            tag: reference.to_owned(),
            architecture: config.architecture,
            fs_layers,
            history,
            signatures: Vec::new(),
        })
    }

    /// Probe layer sizes, at most `probe_concurrency` at a time, keeping layer order.
    async fn probe_layers(
        &self,
        repository: &str,
        layers: &[RawFsLayer],
    ) -> RegistryResult<Vec<FsLayer>> {
        stream::iter(layers)
            .map(|layer| self.probe_layer(repository, &layer.blob_sum))
            .buffered(self.probe_concurrency.get())
            .try_collect()
            .await
    }

    async fn probe_layer(&self, repository: &str, digest: &str) -> RegistryResult<FsLayer> {
        let blob_size = self
            .blob_size(repository, digest)
            .await
            .map_err(|source| RegistryError::LayerSize {
                digest: digest.to_owned(),
                source: Box::new(source),
            })?;

        tracing::trace!(digest, blob_size, "Probed layer size");
        Ok(FsLayer {
            blob_sum: digest.to_owned(),
            blob_size: Some(blob_size),
            blob_path: self.blob_url(repository, digest),
        })
    }

    /// Size of a blob, from the `Content-Length` of a `HEAD` request.
    pub async fn blob_size(&self, repository: &str, digest: &str) -> RegistryResult<u64> {
        let response = self
            .inner
            .head(&blob_path(repository, digest)?)
            .send()
            .await?
            .error_for_status()
            .await?;

        let header_error = |reason: String| RegistryError::Header {
            header: "content-length",
            uri: response.uri().clone(),
            reason,
        };

        let value = response
            .header(header::CONTENT_LENGTH)
            .ok_or_else(|| header_error("missing".into()))?;
        value
            .parse::<u64>()
            .map_err(|err| header_error(format!("{value:?}: {err}")))
    }

    /// Fully qualified URL of a blob.
    pub fn blob_url(&self, repository: &str, digest: &str) -> String {
        format!(
            "{}/{}/blobs/{}",
            self.endpoint,
            encode_path(repository),
            encode_path(digest)
        )
    }

    async fn get_json<T>(&self, path: &str, what: &'static str) -> RegistryResult<T>
    where
        T: DeserializeOwned,
    {
        self.inner
            .get(path)
            .send()
            .await?
            .error_for_status()
            .await?
            .json()
            .await
            .map_err(RegistryError::decode(what))
    }
}

fn blob_path(repository: &str, digest: &str) -> RegistryResult<String> {
    Ok(format!(
        "{}/blobs/{}",
        name_path("repository", repository)?,
        name_path("digest", digest)?
    ))
}

/// Encode a name for use in a request path, refusing names which would
/// leave the repository namespace under the endpoint.
fn name_path(what: &'static str, name: &str) -> RegistryResult<String> {
    let invalid = |reason| RegistryError::InvalidName {
        what,
        name: name.to_owned(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("empty"));
    }

    for segment in name.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            _ => {}
        }
    }

    Ok(encode_path(name))
}

fn decode_json<T: DeserializeOwned>(what: &'static str, body: &[u8]) -> RegistryResult<T> {
    serde_json::from_slice(body).map_err(|source| RegistryError::Decode {
        what,
        source: source.into(),
    })
}
