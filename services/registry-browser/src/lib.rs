//! # Registry Browser
//!
//! A read-only client for the HTTP API of a container image registry. It
//! lists repositories and tags, and fetches manifests normalized into a single
//! [`Manifest`] shape regardless of the schema version the registry served.
//!
//! ## Features
//!
//! - API version probe, catalog and tag listing
//! - Schema 1 manifests: double-encoded history decoded, layer sizes probed
//!   with bounded concurrency
//! - Schema 2 / OCI manifests: history rebuilt from the image configuration
//! - Per-request deadlines, and distinct not-found errors
//!
//! ## Example
//!
//! ```no_run
//! use registry_browser::RegistryClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RegistryClient::new("https://registry.example.com/v2/")?;
//! let manifest = client.get_manifest("library/alpine", "latest").await?;
//!
//! for layer in manifest.layers()?.iter().rev() {
//!     println!("{:>12?} {}", layer.fs_layer.blob_size, layer.command());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod endpoint;
mod error;
pub mod models;

pub use self::client::RegistryClient;
pub use self::config::{RegistryConfig, ENDPOINT_VAR, PROBE_CONCURRENCY_VAR, TIMEOUT_VAR};
pub use self::endpoint::Endpoint;
pub use self::error::{ErrorKind, RegistryError, RegistryResult};
pub use self::models::{Catalog, FsLayer, HistoryEntry, Manifest, Signature, TagList};
