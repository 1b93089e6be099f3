//! Named milestones of stack declaration.

use std::fmt;

use serde::Serialize;
use tracing::info;

/// A milestone reached while declaring the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Checkpoint {
    /// The function code asset was declared.
    CodeAsset,
    /// The function and its role were declared.
    Function,
    /// The gateway invoke permission was declared.
    Permission,
    /// The API definition asset was declared.
    ApiAsset,
    /// The REST API, deployment, and stage were declared.
    RestApi,
    /// The documentation image was resolved (built or marked unavailable).
    DocImage,
    /// The documentation source asset was declared.
    DocSource,
    /// The web bucket was declared.
    Bucket,
    /// The origin access identity and read grant were declared.
    AccessIdentity,
    /// The distribution was declared.
    Distribution,
    /// The bucket deployment was declared.
    Deployment,
    /// Stack outputs were declared.
    Outputs,
}

impl Checkpoint {
    /// Stable name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeAsset => "code-asset",
            Self::Function => "function",
            Self::Permission => "permission",
            Self::ApiAsset => "api-asset",
            Self::RestApi => "rest-api",
            Self::DocImage => "doc-image",
            Self::DocSource => "doc-source",
            Self::Bucket => "bucket",
            Self::AccessIdentity => "access-identity",
            Self::Distribution => "distribution",
            Self::Deployment => "deployment",
            Self::Outputs => "outputs",
        }
    }

    /// Emit the checkpoint as a trace event.
    pub fn emit(self, stack: &str) {
        info!(stack, checkpoint = self.as_str(), "checkpoint reached");
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
