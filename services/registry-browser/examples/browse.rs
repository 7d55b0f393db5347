//! Browse a registry: list repositories and tags, and show the layers of images.
//!
//! ```text
//! cargo run --example browse -- http://localhost:5000/v2 library/alpine:latest
//! ```

use eyre::{eyre, Report};
use registry_browser::{RegistryClient, RegistryConfig};
use tracing_subscriber::EnvFilter;

/// Split `repository:tag` or `repository@digest` into repository and reference.
fn split_image(image: &str) -> Option<(&str, &str)> {
    if let Some(split) = image.split_once('@') {
        return Some(split);
    }

    image
        .rsplit_once(':')
        .filter(|(_, tag)| !tag.contains('/'))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(endpoint) => RegistryConfig::new(endpoint),
        None => RegistryConfig::from_env()?,
    };
    let images: Vec<String> = args.collect();

    let client = RegistryClient::from_config(&config)?;

    if !client.probe_api_version().await? {
        return Err(eyre!("{} does not speak the registry v2 API", client.endpoint()));
    }

    if images.is_empty() {
        let catalog = client.list_repositories().await?;
        for repository in &catalog.repositories {
            let tags = client.list_tags(repository).await?;
            for tag in &tags.tags {
                println!("{}:{}", tags.name, tag);
            }
        }
        return Ok(());
    }

    for image in &images {
        let (repository, reference) = split_image(image)
            .ok_or_else(|| eyre!("expected repository:tag or repository@digest, got {image:?}"))?;

        let manifest = client.get_manifest(repository, reference).await?;
        println!(
            "{}:{} ({}, {} bytes)",
            manifest.name,
            manifest.tag,
            manifest.architecture,
            manifest.total_size()
        );

        let layers = manifest.layers().map_err(Report::new)?;
        for (order, layer) in layers.iter().rev().enumerate() {
            let size = layer
                .fs_layer
                .blob_size
                .map(|size| size.to_string())
                .unwrap_or_else(|| "?".into());
            println!(
                "{:>3} {:>12} {} {}",
                order + 1,
                size,
                layer.fs_layer.blob_sum,
                layer.command()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_split_on_tag_or_digest() {
        assert_eq!(
            split_image("library/alpine:latest"),
            Some(("library/alpine", "latest"))
        );
        assert_eq!(
            split_image("library/alpine@sha256:abcd"),
            Some(("library/alpine", "sha256:abcd"))
        );
        assert_eq!(split_image("library/alpine"), None);
        assert_eq!(split_image("localhost:5000/alpine"), None);
    }
}
