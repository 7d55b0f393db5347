//! Registry API object models.

use serde::{Deserialize, Serialize};

pub mod history;
pub mod manifest;
pub mod signature;

pub use self::history::{normalize_command, ContainerConfig, HistoryEntry, V1CompatibilityRecord};
pub use self::manifest::{FsLayer, ImageLayer, LayerMismatch, Manifest};
pub use self::signature::{Jwk, Signature, SignatureHeader};

/// Repositories known to the registry, in the order the registry returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Repository names.
    pub repositories: Vec<String>,
}

/// Tags of a single repository, in the order the registry returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagList {
    /// Repository name.
    pub name: String,

    /// Tag names.
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keeps_order_and_duplicates() {
        let catalog: Catalog =
            serde_json::from_str(r#"{"repositories": ["zeta", "alpha", "zeta"]}"#).unwrap();
        assert_eq!(catalog.repositories, vec!["zeta", "alpha", "zeta"]);
    }

    #[test]
    fn tag_list_requires_tags() {
        let result = serde_json::from_str::<TagList>(r#"{"name": "alpine"}"#);
        assert!(result.is_err());
    }
}
