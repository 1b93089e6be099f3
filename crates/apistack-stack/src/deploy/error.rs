//! Deployment simulation errors.

/// Errors raised by the simulated deployment primitives.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A resource declaration lacks a property the simulation needs.
    #[error("resource {resource} has no usable {property} property")]
    MissingProperty {
        /// Resource type or id.
        resource: String,
        /// Property name.
        property: String,
    },

    /// The resource is not of the expected type.
    #[error("expected a {expected} resource, found {found}")]
    UnexpectedResourceType {
        /// Expected resource type.
        expected: String,
        /// Actual resource type.
        found: String,
    },

    /// An object key in an artifact is not usable as a bucket key.
    #[error("invalid object key in artifact: {0}")]
    InvalidKey(String),

    /// The same invalidation caller reference was reused for other paths.
    #[error("invalidation {caller_reference} already exists with different paths")]
    InvalidationConflict {
        /// The caller reference.
        caller_reference: String,
    },

    /// A bucket that is retained on teardown was asked to be destroyed.
    #[error("bucket {0} is not empty")]
    BucketNotEmpty(String),

    /// Reading the artifact archive failed.
    #[error("artifact archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Reading the artifact failed.
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for the deployment simulation.
pub type DeployResult<T> = Result<T, DeployError>;
