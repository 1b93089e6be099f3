//! Containerized asset bundling for ApiStack.
//!
//! Assets are declared as [`AssetSpec`] values (a source path, an optional
//! [`BundlingOptions`] recipe, and a content hash). At synthesis time only
//! the hash and staging names are needed; [`AssetPublisher`] does the actual
//! work of running the recipe in a container and staging the result.
//!
//! ```text
//! AssetSpec ──fingerprint──▶ hash ──▶ AssetManifest (synth)
//!     │
//!     └──AssetPublisher──▶ ContainerRuntime::run ──▶ asset.<hash>[.zip]
//! ```
//!
//! Images built from a local context go through [`ImageBuildPolicy`], which
//! decides whether a failed build aborts or is carried as an unavailable
//! image that fails the publish step using it.

mod error;
pub mod fingerprint;
mod image;
mod manifest;
mod options;
mod publish;
mod runtime;
mod staging;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{BundlingError, BundlingResult};
pub use image::{DockerImage, ImageBuildPolicy};
pub use manifest::{
    AssetDestination, AssetEntry, AssetManifest, AssetSource, CURRENT_ENVIRONMENT,
    MANIFEST_VERSION,
};
pub use options::{
    ASSET_INPUT_DIR, ASSET_OUTPUT_DIR, BundlingOptions, BundlingOutput, ContainerOnly,
    DockerVolume, LocalBundling,
};
pub use publish::{AssetPublisher, PublishedAsset};
pub use runtime::{ContainerRuntime, DockerCli, RunInvocation};
pub use staging::{
    AssetKind, AssetPackaging, AssetSpec, DEFAULT_QUALIFIER, staging_bucket_name,
    staging_bucket_template,
};
