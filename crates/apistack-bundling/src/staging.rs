//! Asset declarations and their content-addressed staging names.

use std::path::{Path, PathBuf};

use apistack_core::{AccountId, AwsRegion, LogicalId};
use serde::Serialize;
use tracing::debug;

use crate::error::BundlingResult;
use crate::fingerprint::fingerprint_with_extra;
use crate::options::{BundlingOptions, BundlingOutput};

/// Qualifier of the default bootstrap resources.
pub const DEFAULT_QUALIFIER: &str = "hnb659fds";

/// Staging bucket name with account and region left as pseudo-parameter
/// placeholders, suitable for `Fn::Sub`.
#[must_use]
pub fn staging_bucket_template() -> String {
    format!("cdk-{DEFAULT_QUALIFIER}-assets-${{AWS::AccountId}}-${{AWS::Region}}")
}

/// Staging bucket name for a concrete environment.
#[must_use]
pub fn staging_bucket_name(account: &AccountId, region: &AwsRegion) -> String {
    format!("cdk-{DEFAULT_QUALIFIER}-assets-{account}-{region}")
}

/// Whether an asset source is a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    /// A single file.
    File,
    /// A directory.
    Directory,
}

/// How a staged asset is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetPackaging {
    /// Upload the staged file as is.
    #[serde(rename = "file")]
    File,
    /// Zip the staged directory and upload the archive.
    #[serde(rename = "zip")]
    ZipDirectory,
}

/// A declared asset: where it comes from, how it is built, and its hash.
#[derive(Debug, Clone)]
pub struct AssetSpec {
    id: LogicalId,
    source: PathBuf,
    kind: AssetKind,
    bundling: Option<BundlingOptions>,
    hash: String,
}

impl AssetSpec {
    /// Declare an asset and fingerprint its source.
    ///
    /// The hash covers the source contents and the bundling options, so a
    /// change to either produces a new object key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BundlingError::SourceNotFound`] if the source does
    /// not exist, or an I/O error if it cannot be read.
    pub fn new(
        id: LogicalId,
        source: impl Into<PathBuf>,
        kind: AssetKind,
        bundling: Option<BundlingOptions>,
    ) -> BundlingResult<Self> {
        let source = source.into();
        let extra = bundling
            .as_ref()
            .map(BundlingOptions::fingerprint_input)
            .transpose()
            .map_err(anyhow::Error::from)?;
        let hash = fingerprint_with_extra(&source, extra.as_deref())?;
        debug!(logical_id = %id, source = %source.display(), %hash, "fingerprinted asset");

        Ok(Self {
            id,
            source,
            kind,
            bundling,
            hash,
        })
    }

    /// Logical id of the asset node.
    #[must_use]
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    /// Source path on the build host.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Source kind.
    #[must_use]
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Bundling recipe, if the asset is built in a container.
    #[must_use]
    pub fn bundling(&self) -> Option<&BundlingOptions> {
        self.bundling.as_ref()
    }

    /// Hex SHA-256 asset hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// How the staged asset is uploaded.
    #[must_use]
    pub fn packaging(&self) -> AssetPackaging {
        match (&self.bundling, self.kind) {
            (None, AssetKind::File) => AssetPackaging::File,
            (None, AssetKind::Directory) => AssetPackaging::ZipDirectory,
            (Some(options), _) => match options.output_type {
                BundlingOutput::Archived => AssetPackaging::File,
                BundlingOutput::NotArchived => AssetPackaging::ZipDirectory,
            },
        }
    }

    /// Object key in the staging bucket.
    #[must_use]
    pub fn object_key(&self) -> String {
        if self.bundling.is_none() && self.kind == AssetKind::File {
            let extension = self
                .source
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            format!("{}{extension}", self.hash)
        } else {
            format!("{}.zip", self.hash)
        }
    }

    /// Name of the staged file or directory under the output directory.
    #[must_use]
    pub fn staged_name(&self) -> String {
        match self.packaging() {
            AssetPackaging::ZipDirectory => format!("asset.{}", self.hash),
            AssetPackaging::File => {
                let key = self.object_key();
                let extension = key.strip_prefix(self.hash.as_str()).unwrap_or_default();
                format!("asset.{}{extension}", self.hash)
            }
        }
    }

    /// `s3://` URL of the uploaded object, for use inside `Fn::Sub`.
    #[must_use]
    pub fn s3_url_template(&self) -> String {
        format!("s3://{}/{}", staging_bucket_template(), self.object_key())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::image::DockerImage;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn archived() -> BundlingOptions {
        BundlingOptions::builder()
            .image(DockerImage::from_registry("public.ecr.aws/sam/build-java11"))
            .command(vec!["mvn".into(), "package".into()])
            .output_type(BundlingOutput::Archived)
            .build()
    }

    #[test]
    fn test_should_key_plain_file_asset_by_hash_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.yaml");
        fs::write(&path, "openapi: 3.0.0").unwrap();

        let spec = AssetSpec::new(id("ApiAsset"), &path, AssetKind::File, None).unwrap();
        assert_eq!(spec.packaging(), AssetPackaging::File);
        assert_eq!(spec.object_key(), format!("{}.yaml", spec.hash()));
        assert_eq!(spec.staged_name(), format!("asset.{}.yaml", spec.hash()));
        assert!(
            spec.s3_url_template()
                .starts_with("s3://cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}/")
        );
    }

    #[test]
    fn test_should_package_bundled_assets_by_output_type() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();

        let code = AssetSpec::new(id("Code"), dir.path(), AssetKind::Directory, Some(archived()))
            .unwrap();
        assert_eq!(code.packaging(), AssetPackaging::File);
        assert_eq!(code.object_key(), format!("{}.zip", code.hash()));
        assert_eq!(code.staged_name(), format!("asset.{}.zip", code.hash()));

        let mut site = archived();
        site.output_type = BundlingOutput::NotArchived;
        let docs =
            AssetSpec::new(id("Docs"), dir.path(), AssetKind::Directory, Some(site)).unwrap();
        assert_eq!(docs.packaging(), AssetPackaging::ZipDirectory);
        assert_eq!(docs.staged_name(), format!("asset.{}", docs.hash()));
        assert_ne!(code.hash(), docs.hash());
    }

    #[test]
    fn test_should_name_staging_bucket_for_environment() {
        let name = staging_bucket_name(
            &AccountId::new("123456789012").unwrap(),
            &AwsRegion::new("eu-west-1"),
        );
        assert_eq!(name, "cdk-hnb659fds-assets-123456789012-eu-west-1");
    }
}
