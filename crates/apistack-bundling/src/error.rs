//! Bundling error types.

use std::path::PathBuf;

/// Errors raised while building images, bundling, or staging assets.
#[derive(Debug, thiserror::Error)]
pub enum BundlingError {
    /// The asset source path does not exist.
    #[error("asset source not found: {}", path.display())]
    SourceNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Filesystem error on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Building a local image from a build context failed.
    #[error("failed to build image from {}: {reason}", context.display())]
    ImageBuild {
        /// Build context directory.
        context: PathBuf,
        /// Failure description.
        reason: String,
    },

    /// A bundling step referenced an image that was never built.
    #[error("bundling image {image} is unavailable: {reason}")]
    ImageUnavailable {
        /// Image reference.
        image: String,
        /// Why the image is unavailable.
        reason: String,
    },

    /// A container runtime command exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        /// The command line that was run.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Archived bundling output must contain exactly one file.
    #[error(
        "bundling output directory {} must contain exactly one file for archived output, found {count}",
        dir.display()
    )]
    UnexpectedArchiveOutput {
        /// The bundling output directory.
        dir: PathBuf,
        /// Number of entries found.
        count: usize,
    },

    /// Zip archive error.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BundlingError {
    /// Wrap an I/O error with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result type for bundling operations.
pub type BundlingResult<T> = Result<T, BundlingError>;
