//! Constructs: typed declarations that expand into template resources.
//!
//! Each construct implements [`crate::Construct`]. Cross-construct
//! dependencies are expressed by taking a [`crate::Handle`] of the
//! construct depended upon, never a bare logical id.

pub mod apigateway;
pub mod assets;
pub mod cloudfront;
pub mod deployment;
pub mod lambda;
pub mod s3;

use apistack_template::Value;

use crate::error::StackError;

/// Function name of the externally provisioned auto-delete-objects provider.
pub const AUTO_DELETE_OBJECTS_PROVIDER: &str = "CustomS3AutoDeleteObjectsProvider";

/// Function name of the externally provisioned bucket-deployment provider.
pub const BUCKET_DEPLOYMENT_PROVIDER: &str = "CustomCDKBucketDeploymentProvider";

/// `ServiceToken` of a custom resource backed by a provider function in the
/// stack's own account and region.
pub(crate) fn provider_service_token(function_name: &str) -> Value {
    Value::sub(format!(
        "arn:${{AWS::Partition}}:lambda:${{AWS::Region}}:${{AWS::AccountId}}:function:{function_name}"
    ))
}

pub(crate) fn invalid(id: impl ToString, reason: impl Into<String>) -> StackError {
    StackError::InvalidConstruct {
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Standard IAM policy document wrapper.
pub(crate) fn policy_document(statements: Vec<Value>) -> Value {
    Value::map([
        ("Statement", Value::List(statements)),
        ("Version", Value::str("2012-10-17")),
    ])
}
