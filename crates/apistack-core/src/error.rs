//! Error types for the ApiStack core.

/// Core error type for identifiers, configuration, and graph construction.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Invalid AWS account ID format.
    #[error("invalid AWS account ID: {0} (must be 12-digit numeric string)")]
    InvalidAccountId(String),

    /// Invalid CloudFormation logical ID.
    #[error("invalid logical ID: {id}: {reason}")]
    InvalidLogicalId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Invalid API Gateway stage name.
    #[error("invalid stage name: {name}: {reason}")]
    InvalidStageName {
        /// The rejected stage name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Invalid S3 bucket name.
    #[error("invalid bucket name: {name}: {reason}")]
    InvalidBucketName {
        /// The rejected bucket name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A node with the same logical ID was already declared.
    #[error("logical ID already declared: {0}")]
    DuplicateLogicalId(String),

    /// A node references another node that has not been declared yet.
    #[error("{from} references {to}, which has not been declared")]
    UndeclaredReference {
        /// The node holding the reference.
        from: String,
        /// The missing target.
        to: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected involving: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
