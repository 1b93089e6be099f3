//! Bundling images and the policy for image build failures.
//!
//! An image either comes from a registry or is built locally from a build
//! context. A local build is a Result-typed step: the caller decides through
//! [`ImageBuildPolicy`] whether a failure aborts synthesis or is logged and
//! carried forward as an unavailable image. An unavailable image fails the
//! bundling step that uses it, not the declaration of that step.

use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{BundlingError, BundlingResult};
use crate::fingerprint::fingerprint_path;
use crate::runtime::ContainerRuntime;

/// Prefix of tags given to locally built images.
const LOCAL_IMAGE_PREFIX: &str = "apistack";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Availability {
    Ready,
    Unavailable { reason: String },
}

/// A container image used for bundling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImage {
    image: String,
    availability: Availability,
}

impl DockerImage {
    /// Reference an image pulled from a registry.
    #[must_use]
    pub fn from_registry(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            availability: Availability::Ready,
        }
    }

    /// Build an image from a local build context.
    ///
    /// The tag is derived from the content fingerprint of the context, so
    /// rebuilding an unchanged context reuses the same tag.
    ///
    /// # Errors
    ///
    /// Returns [`BundlingError::SourceNotFound`] if the context is missing,
    /// or [`BundlingError::ImageBuild`] if the runtime fails to build it.
    pub async fn from_build(
        runtime: &dyn ContainerRuntime,
        context: &Path,
    ) -> BundlingResult<Self> {
        let fingerprint = fingerprint_path(context)?;
        let tag = format!("{LOCAL_IMAGE_PREFIX}-{fingerprint}");
        info!(context = %context.display(), %tag, "building bundling image");

        runtime
            .build_image(context, &tag)
            .await
            .map_err(|e| BundlingError::ImageBuild {
                context: context.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self::from_registry(tag))
    }

    /// An image reference that could not be produced.
    #[must_use]
    pub fn unavailable(image: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            availability: Availability::Unavailable {
                reason: reason.into(),
            },
        }
    }

    /// The image reference passed to the container runtime.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Whether the image can be used to run a bundling step.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Ready
    }

    /// Fail if the image is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`BundlingError::ImageUnavailable`] carrying the underlying
    /// build failure.
    pub fn ensure_available(&self) -> BundlingResult<()> {
        match &self.availability {
            Availability::Ready => Ok(()),
            Availability::Unavailable { reason } => Err(BundlingError::ImageUnavailable {
                image: self.image.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

impl fmt::Display for DockerImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.image)
    }
}

impl Serialize for DockerImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.image)
    }
}

/// What to do when a locally built bundling image fails to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageBuildPolicy {
    /// Log the failure and continue with an unavailable image.
    #[default]
    Continue,
    /// Propagate the failure.
    Abort,
}

impl ImageBuildPolicy {
    /// Map a "continue on failure" flag to a policy.
    #[must_use]
    pub fn from_continue_flag(continue_on_failure: bool) -> Self {
        if continue_on_failure {
            Self::Continue
        } else {
            Self::Abort
        }
    }

    /// Apply the policy to the outcome of [`DockerImage::from_build`].
    ///
    /// # Errors
    ///
    /// Under [`ImageBuildPolicy::Abort`], returns the build error unchanged.
    pub fn resolve(
        self,
        context: &Path,
        outcome: BundlingResult<DockerImage>,
    ) -> BundlingResult<DockerImage> {
        match (self, outcome) {
            (_, Ok(image)) => Ok(image),
            (Self::Abort, Err(e)) => Err(e),
            (Self::Continue, Err(e)) => {
                let image = unbuilt_tag(context);
                warn!(
                    context = %context.display(),
                    %image,
                    error = %e,
                    "bundling image build failed, continuing without it"
                );
                Ok(DockerImage::unavailable(image, e.to_string()))
            }
        }
    }
}

/// Tag for an image whose context could not be built (or even read).
fn unbuilt_tag(context: &Path) -> String {
    let digest = Sha256::digest(context.to_string_lossy().as_bytes());
    format!("{LOCAL_IMAGE_PREFIX}-unbuilt-{}", &hex::encode(digest)[..16])
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn build_error() -> BundlingError {
        BundlingError::ImageBuild {
            context: PathBuf::from("../api/docker"),
            reason: "docker daemon not running".to_owned(),
        }
    }

    #[test]
    fn test_should_treat_registry_image_as_available() {
        let image = DockerImage::from_registry("public.ecr.aws/sam/build-java11");
        assert!(image.is_available());
        assert!(image.ensure_available().is_ok());
        assert_eq!(image.to_string(), "public.ecr.aws/sam/build-java11");
    }

    #[test]
    fn test_should_continue_with_unavailable_image() {
        let image = ImageBuildPolicy::Continue
            .resolve(Path::new("../api/docker"), Err(build_error()))
            .unwrap();
        assert!(!image.is_available());
        assert!(image.image().starts_with("apistack-unbuilt-"));

        let err = image.ensure_available().unwrap_err();
        assert!(matches!(err, BundlingError::ImageUnavailable { ref reason, .. }
            if reason.contains("docker daemon not running")));
    }

    #[test]
    fn test_should_abort_on_build_failure() {
        let err = ImageBuildPolicy::Abort
            .resolve(Path::new("../api/docker"), Err(build_error()))
            .unwrap_err();
        assert!(matches!(err, BundlingError::ImageBuild { .. }));
    }

    #[test]
    fn test_should_pass_through_successful_build() {
        let built = DockerImage::from_registry("apistack-abc");
        let image = ImageBuildPolicy::Abort
            .resolve(Path::new("ctx"), Ok(built.clone()))
            .unwrap();
        assert_eq!(image, built);
    }

    #[test]
    fn test_should_map_continue_flag() {
        assert_eq!(ImageBuildPolicy::from_continue_flag(true), ImageBuildPolicy::Continue);
        assert_eq!(ImageBuildPolicy::from_continue_flag(false), ImageBuildPolicy::Abort);
        assert_eq!(ImageBuildPolicy::default(), ImageBuildPolicy::Continue);
    }

    #[test]
    fn test_should_derive_stable_unbuilt_tag() {
        assert_eq!(unbuilt_tag(Path::new("a")), unbuilt_tag(Path::new("a")));
        assert_ne!(unbuilt_tag(Path::new("a")), unbuilt_tag(Path::new("b")));
    }
}
