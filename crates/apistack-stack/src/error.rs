//! Stack error types.

use apistack_bundling::BundlingError;
use apistack_core::CoreError;

use crate::deploy::DeployError;

/// Errors raised while declaring, synthesizing, or applying the stack.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// A construct was given properties it cannot be declared with.
    #[error("invalid construct {id}: {reason}")]
    InvalidConstruct {
        /// Construct id.
        id: String,
        /// What is wrong.
        reason: String,
    },

    /// Identifier, configuration, or graph error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Asset bundling or image build error.
    #[error(transparent)]
    Bundling(#[from] BundlingError),

    /// Simulated deployment error.
    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// Writing synthesized output failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being written.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Template or manifest serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for stack operations.
pub type StackResult<T> = Result<T, StackError>;
