//! Bundling options: what to run, in which image, with which mounts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use typed_builder::TypedBuilder;

use crate::image::DockerImage;

/// Container path where the asset source is mounted.
pub const ASSET_INPUT_DIR: &str = "/asset-input";

/// Container path the bundling command must write its output to.
pub const ASSET_OUTPUT_DIR: &str = "/asset-output";

/// A host directory bind-mounted into the bundling container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerVolume {
    /// Path on the build host.
    pub host_path: PathBuf,
    /// Path inside the container.
    pub container_path: String,
}

impl DockerVolume {
    /// Create a read/write bind mount.
    #[must_use]
    pub fn new(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }

    /// The `-v` argument value for `docker run`.
    #[must_use]
    pub fn to_mount_arg(&self) -> String {
        format!(
            "{}:{}:delegated",
            self.host_path.display(),
            self.container_path
        )
    }
}

/// How the bundling output directory becomes the published asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundlingOutput {
    /// The output directory holds a single archive that is used as is.
    Archived,
    /// The output directory tree is zipped on publish.
    #[default]
    NotArchived,
}

/// Hook that may bundle an asset on the host instead of in a container.
///
/// Returning `false` hands the work to the container runtime.
pub trait LocalBundling: Send + Sync + fmt::Debug {
    /// Try to bundle into `output_dir`; `true` means the output is complete.
    fn try_bundle(&self, output_dir: &Path, options: &BundlingOptions) -> bool;
}

/// Always declines local bundling so every build runs in its image.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerOnly;

impl LocalBundling for ContainerOnly {
    fn try_bundle(&self, _output_dir: &Path, _options: &BundlingOptions) -> bool {
        false
    }
}

/// Recipe for producing an asset inside an isolated build environment.
///
/// # Examples
///
/// ```
/// use apistack_bundling::{BundlingOptions, BundlingOutput, DockerImage, DockerVolume};
///
/// let options = BundlingOptions::builder()
///     .image(DockerImage::from_registry("public.ecr.aws/sam/build-java11"))
///     .command(vec!["/bin/sh".into(), "-c".into(), "mvn package".into()])
///     .volumes(vec![DockerVolume::new("/home/me/.m2/", "/root/.m2/")])
///     .user("root")
///     .output_type(BundlingOutput::Archived)
///     .build();
/// assert_eq!(options.user.as_deref(), Some("root"));
/// ```
#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct BundlingOptions {
    /// Image the command runs in.
    pub image: DockerImage,

    /// Command and arguments run in the container.
    #[builder(default)]
    pub command: Vec<String>,

    /// Additional bind mounts (e.g. a dependency cache).
    #[builder(default)]
    pub volumes: Vec<DockerVolume>,

    /// User the command runs as.
    #[builder(default, setter(strip_option, into))]
    pub user: Option<String>,

    /// How the output directory is packaged.
    #[builder(default)]
    pub output_type: BundlingOutput,

    /// Host bundling hook; defaults to [`ContainerOnly`].
    #[serde(skip)]
    #[builder(default = Arc::new(ContainerOnly))]
    pub local: Arc<dyn LocalBundling>,
}

impl BundlingOptions {
    /// Stable JSON rendering used as fingerprint input.
    ///
    /// # Errors
    ///
    /// Returns a serialization error (not expected for these fields).
    pub fn fingerprint_input(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
