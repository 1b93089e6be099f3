//! File and directory assets.

use std::path::PathBuf;

use apistack_bundling::{AssetKind, AssetSpec, BundlingOptions, staging_bucket_template};
use apistack_core::LogicalId;
use apistack_template::Value;

use crate::builder::{Construct, StackBuilder};
use crate::error::StackResult;

/// Where a declared asset lands in the staging bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocation {
    /// Asset hash.
    pub hash: String,
    /// Object key in the staging bucket.
    pub object_key: String,
}

impl AssetLocation {
    fn of(asset: &AssetSpec) -> Self {
        Self {
            hash: asset.hash().to_owned(),
            object_key: asset.object_key(),
        }
    }

    /// Staging bucket name, resolved at apply time.
    #[must_use]
    pub fn bucket_name(&self) -> Value {
        Value::sub(staging_bucket_template())
    }

    /// Object key as a template value.
    #[must_use]
    pub fn object_key_value(&self) -> Value {
        Value::str(&self.object_key)
    }

    /// `s3://bucket/key` URL, resolved at apply time.
    #[must_use]
    pub fn s3_url(&self) -> Value {
        Value::sub(format!("s3://{}/{}", staging_bucket_template(), self.object_key))
    }
}

/// A single file uploaded as is.
#[derive(Debug, Clone)]
pub struct FileAsset {
    path: PathBuf,
}

impl FileAsset {
    /// Declare a file asset at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Construct for FileAsset {
    type Attrs = AssetLocation;

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, AssetLocation)> {
        let asset = AssetSpec::new(id.clone(), self.path, AssetKind::File, None)?;
        let location = AssetLocation::of(&asset);
        stack.declare_asset(asset)?;
        Ok((id, location))
    }
}

/// A directory, optionally built by a bundling step, uploaded as a zip.
#[derive(Debug, Clone)]
pub struct DirectoryAsset {
    path: PathBuf,
    bundling: Option<BundlingOptions>,
}

impl DirectoryAsset {
    /// Declare a directory asset at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bundling: None,
        }
    }

    /// Build the asset with a bundling step instead of zipping the source.
    #[must_use]
    pub fn with_bundling(mut self, options: BundlingOptions) -> Self {
        self.bundling = Some(options);
        self
    }
}

impl Construct for DirectoryAsset {
    type Attrs = AssetLocation;

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, AssetLocation)> {
        let asset = AssetSpec::new(id.clone(), self.path, AssetKind::Directory, self.bundling)?;
        let location = AssetLocation::of(&asset);
        stack.declare_asset(asset)?;
        Ok((id, location))
    }
}
