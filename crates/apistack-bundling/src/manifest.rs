//! The asset manifest written next to the synthesized template.

use std::collections::BTreeMap;
use std::path::Path;

use apistack_core::{AccountId, AwsRegion};
use serde::Serialize;

use crate::error::{BundlingError, BundlingResult};
use crate::staging::{AssetPackaging, AssetSpec, staging_bucket_name};

/// Manifest schema version.
pub const MANIFEST_VERSION: &str = "36.0.0";

/// Destination key for the stack's own environment.
pub const CURRENT_ENVIRONMENT: &str = "current_account-current_region";

/// Where a staged asset comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSource {
    /// Path relative to the output directory.
    pub path: String,
    /// How the staged path is uploaded.
    pub packaging: AssetPackaging,
}

/// Where a staged asset is uploaded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDestination {
    /// Staging bucket.
    pub bucket_name: String,
    /// Object key (content-addressed).
    pub object_key: String,
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    /// Staged source.
    pub source: AssetSource,
    /// Upload destinations by environment.
    pub destinations: BTreeMap<String, AssetDestination>,
}

/// File assets keyed by asset hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    /// Schema version.
    pub version: String,
    /// Entries keyed by hash.
    pub files: BTreeMap<String, AssetEntry>,
}

impl AssetManifest {
    /// Build the manifest for a set of declared assets.
    ///
    /// Assets with the same hash collapse into one entry.
    #[must_use]
    pub fn new<'a>(
        assets: impl IntoIterator<Item = &'a AssetSpec>,
        account: &AccountId,
        region: &AwsRegion,
    ) -> Self {
        let bucket_name = staging_bucket_name(account, region);
        let files = assets
            .into_iter()
            .map(|asset| {
                let destination = AssetDestination {
                    bucket_name: bucket_name.clone(),
                    object_key: asset.object_key(),
                };
                let entry = AssetEntry {
                    source: AssetSource {
                        path: asset.staged_name(),
                        packaging: asset.packaging(),
                    },
                    destinations: BTreeMap::from([(CURRENT_ENVIRONMENT.to_owned(), destination)]),
                };
                (asset.hash().to_owned(), entry)
            })
            .collect();

        Self {
            version: MANIFEST_VERSION.to_owned(),
            files,
        }
    }

    /// Number of distinct assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the manifest lists no assets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Pretty JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns a serialization error (not expected for this type).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the manifest to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BundlingError::Io`] if the file cannot be written.
    pub async fn write_to(&self, path: &Path) -> BundlingResult<()> {
        let json = self.to_json_pretty().map_err(anyhow::Error::from)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| BundlingError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use apistack_core::LogicalId;

    use super::*;
    use crate::staging::AssetKind;

    #[tokio::test]
    async fn test_should_write_manifest_with_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("openapi.yaml");
        fs::write(&source, "openapi: 3.0.0").unwrap();
        let asset = AssetSpec::new(
            LogicalId::new("ApiAsset").unwrap(),
            &source,
            AssetKind::File,
            None,
        )
        .unwrap();

        let manifest = AssetManifest::new([&asset, &asset], &AccountId::default(), &AwsRegion::default());
        assert_eq!(manifest.len(), 1);

        let path = dir.path().join("Stack.assets.json");
        manifest.write_to(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        let entry = &json["files"][asset.hash()];
        assert_eq!(entry["source"]["packaging"], "file");
        assert_eq!(entry["source"]["path"], asset.staged_name());
        let destination = &entry["destinations"][CURRENT_ENVIRONMENT];
        assert_eq!(
            destination["bucketName"],
            "cdk-hnb659fds-assets-000000000000-us-east-1"
        );
        assert_eq!(destination["objectKey"], asset.object_key());
    }
}
