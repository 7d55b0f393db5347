//! Image manifests, normalized from schema 1 and schema 2 wire formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::{ContainerConfig, HistoryEntry, RawHistoryEntry, V1CompatibilityRecord};
use super::signature::Signature;
use crate::error::{RegistryError, RegistryResult};

/// Schema 1 signed manifest media type.
pub const MEDIA_TYPE_MANIFEST_V1_SIGNED: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";
/// Schema 1 unsigned manifest media type.
pub const MEDIA_TYPE_MANIFEST_V1: &str = "application/vnd.docker.distribution.manifest.v1+json";
/// Schema 2 image manifest media type.
pub const MEDIA_TYPE_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// OCI image manifest media type.
pub const MEDIA_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Manifest media types this client can read, in order of preference.
pub const MANIFEST_MEDIA_TYPES: [&str; 4] = [
    MEDIA_TYPE_MANIFEST_V1_SIGNED,
    MEDIA_TYPE_MANIFEST_V1,
    MEDIA_TYPE_MANIFEST_V2,
    MEDIA_TYPE_OCI_MANIFEST,
];

/// Value of the `Accept` header sent with manifest requests.
pub(crate) fn manifest_accept() -> String {
    MANIFEST_MEDIA_TYPES.join(", ")
}

/// An image manifest.
///
/// Layers and history are kept in registry order, most recent layer first.
/// `fs_layers[i]` and `history[i]` describe the same build step; use
/// [`Manifest::layers`] to pair them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest schema version the registry served.
    pub schema_version: u32,
    /// Repository name.
    pub name: String,
    /// Tag or digest the manifest was requested by.
    pub tag: String,
    /// CPU architecture of the image.
    pub architecture: String,
    /// Filesystem layers.
    pub fs_layers: Vec<FsLayer>,
    /// Build history.
    pub history: Vec<HistoryEntry>,
    /// Detached signatures, passed through unverified.
    pub signatures: Vec<Signature>,
}

/// One filesystem layer of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsLayer {
    /// Content digest, e.g. `sha256:...`.
    pub blob_sum: String,
    /// Size of the blob in bytes.
    pub blob_size: Option<u64>,
    /// Fully qualified URL of the blob.
    pub blob_path: String,
}

/// Layer and history counts of a manifest disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("manifest has {layers} filesystem layers but {history} history entries")]
pub struct LayerMismatch {
    /// Number of filesystem layers.
    pub layers: usize,
    /// Number of history entries.
    pub history: usize,
}

/// A filesystem layer paired with the build step which produced it.
#[derive(Debug, Clone, Copy)]
pub struct ImageLayer<'m> {
    /// Position in registry order.
    pub index: usize,
    /// The layer blob.
    pub fs_layer: &'m FsLayer,
    /// The build step.
    pub history: &'m HistoryEntry,
}

impl ImageLayer<'_> {
    /// The normalized build command of this layer.
    pub fn command(&self) -> String {
        self.history.v1_compatibility.command()
    }
}

impl Manifest {
    /// Pair filesystem layers with history entries by index.
    pub fn layers(&self) -> Result<Vec<ImageLayer<'_>>, LayerMismatch> {
        if self.fs_layers.len() != self.history.len() {
            return Err(LayerMismatch {
                layers: self.fs_layers.len(),
                history: self.history.len(),
            });
        }

        Ok(self
            .fs_layers
            .iter()
            .zip(&self.history)
            .enumerate()
            .map(|(index, (fs_layer, history))| ImageLayer {
                index,
                fs_layer,
                history,
            })
            .collect())
    }

    /// Sum of all known layer sizes.
    pub fn total_size(&self) -> u64 {
        self.fs_layers.iter().filter_map(|layer| layer.blob_size).sum()
    }
}

/// Just enough of a manifest to pick a decoder.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ManifestVersion {
    pub(crate) schema_version: u32,
}

/// Schema 1 manifest as served by the registry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignedManifest {
    pub(crate) schema_version: u32,
    pub(crate) name: String,
    pub(crate) tag: String,
    pub(crate) architecture: String,
    pub(crate) fs_layers: Vec<RawFsLayer>,
    pub(crate) history: Vec<RawHistoryEntry>,
    #[serde(default)]
    pub(crate) signatures: Vec<Signature>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFsLayer {
    pub(crate) blob_sum: String,
}

impl SignedManifest {
    /// Decode every history entry; the first malformed entry fails the manifest.
    pub(crate) fn decode_history(&self) -> RegistryResult<Vec<HistoryEntry>> {
        self.history
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .decode()
                    .map_err(|source| RegistryError::History { index, source })
            })
            .collect()
    }
}

/// Schema 2 / OCI image manifest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageManifest {
    pub(crate) config: Descriptor,
    pub(crate) layers: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Descriptor {
    pub(crate) digest: String,
    pub(crate) size: u64,
}

/// The image configuration blob referenced by a schema 2 manifest.
#[derive(Debug, Deserialize)]
pub(crate) struct ImageConfig {
    pub(crate) architecture: String,
    #[serde(default)]
    pub(crate) created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) history: Vec<ConfigHistory>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfigHistory {
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    empty_layer: bool,
}

impl ImageConfig {
    /// Build history records for the given layer digests (most recent first).
    ///
    /// Steps which produced no layer are skipped, so that the remaining
    /// records line up with the layers by index.
    pub(crate) fn history_for(&self, digests: &[&str]) -> Vec<HistoryEntry> {
        self.history
            .iter()
            .rev()
            .filter(|step| !step.empty_layer)
            .enumerate()
            .map(|(index, step)| HistoryEntry {
                v1_compatibility: V1CompatibilityRecord {
                    id: digests.get(index).copied().unwrap_or_default().to_owned(),
                    parent: digests.get(index + 1).map(|digest| (*digest).to_owned()),
                    throwaway: false,
                    created: step.created.or(self.created),
                    container_config: ContainerConfig {
                        cmd: step.created_by.iter().cloned().collect(),
                    },
                },
            })
            .collect()
    }
}
