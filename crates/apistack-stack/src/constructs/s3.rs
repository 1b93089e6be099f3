//! Buckets, their teardown behavior, and read grants.

use apistack_core::validation::validate_bucket_name;
use apistack_core::{BucketEncryption, LogicalId};
use apistack_template::{DeletionPolicy, ResourceDecl, Value};
use serde::Serialize;
use typed_builder::TypedBuilder;

use super::cloudfront::OriginAccessIdentity;
use super::{AUTO_DELETE_OBJECTS_PROVIDER, invalid, policy_document, provider_service_token};
use crate::builder::{Construct, Handle, StackBuilder};
use crate::error::StackResult;

/// Tag marking a bucket whose objects are deleted with it.
pub const AUTO_DELETE_TAG: &str = "aws-cdk:auto-delete-objects";

/// Custom resource type that empties a bucket before it is deleted.
pub const AUTO_DELETE_RESOURCE_TYPE: &str = "Custom::S3AutoDeleteObjects";

/// Actions granted by a read grant.
pub const READ_ACTIONS: [&str; 3] = ["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

/// What happens to a bucket when the stack is deleted.
///
/// Deleting a bucket only succeeds when it is empty, so deletion and
/// emptying always go together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownPolicy {
    /// Keep the bucket and its contents.
    #[default]
    Retain,
    /// Empty the bucket, then delete it.
    DestroyWithContents,
}

impl TeardownPolicy {
    /// The deletion policy written on the bucket resource.
    #[must_use]
    pub fn deletion_policy(&self) -> DeletionPolicy {
        match self {
            Self::Retain => DeletionPolicy::Retain,
            Self::DestroyWithContents => DeletionPolicy::Delete,
        }
    }

    /// Whether objects are deleted along with the bucket.
    #[must_use]
    pub fn auto_delete_objects(&self) -> bool {
        matches!(self, Self::DestroyWithContents)
    }
}

/// Declared bucket properties that the rest of the stack relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketAttrs {
    /// Teardown behavior.
    pub teardown: TeardownPolicy,
    /// Whether versioning is enabled.
    pub versioned: bool,
    /// Server-side encryption.
    pub encryption: BucketEncryption,
    /// The auto-delete custom resource, when declared.
    pub auto_delete: Option<LogicalId>,
}

/// An S3 bucket.
///
/// # Examples
///
/// ```
/// use apistack_stack::StackBuilder;
/// use apistack_stack::constructs::s3::{Bucket, TeardownPolicy};
///
/// let mut stack = StackBuilder::new("Demo", None);
/// let bucket = stack
///     .add(
///         "Site",
///         Bucket::builder()
///             .versioned(true)
///             .teardown(TeardownPolicy::DestroyWithContents)
///             .build(),
///     )
///     .unwrap();
/// assert!(bucket.attrs().auto_delete.is_some());
/// ```
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct Bucket {
    /// Physical name; generated on apply when unset.
    #[builder(default, setter(strip_option, into))]
    bucket_name: Option<String>,

    /// Keep every version of every object.
    #[builder(default)]
    versioned: bool,

    /// Server-side encryption.
    #[builder(default)]
    encryption: BucketEncryption,

    /// Teardown behavior.
    #[builder(default)]
    teardown: TeardownPolicy,
}

impl Construct for Bucket {
    type Attrs = BucketAttrs;

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, BucketAttrs)> {
        if let Some(name) = &self.bucket_name {
            validate_bucket_name(name).map_err(|e| invalid(&id, e.to_string()))?;
        }

        let versioning = self
            .versioned
            .then(|| Value::map([("Status", Value::str("Enabled"))]));
        let encryption = self.encryption.sse_algorithm().map(|algorithm| {
            let rule = Value::map([(
                "ServerSideEncryptionByDefault",
                Value::map([("SSEAlgorithm", Value::str(algorithm))]),
            )]);
            Value::map([("ServerSideEncryptionConfiguration", Value::list([rule]))])
        });
        let tags = self.teardown.auto_delete_objects().then(|| {
            Value::list([Value::map([
                ("Key", Value::str(AUTO_DELETE_TAG)),
                ("Value", Value::str("true")),
            ])])
        });

        let policy = self.teardown.deletion_policy();
        let decl = ResourceDecl::new("AWS::S3::Bucket")
            .property_opt("BucketName", self.bucket_name.map(Value::from))
            .property_opt("BucketEncryption", encryption)
            .property_opt("Tags", tags)
            .property_opt("VersioningConfiguration", versioning)
            .deletion_policy(policy)
            .update_replace_policy(policy);
        stack.declare_resource(id.clone(), decl)?;

        let auto_delete = if self.teardown.auto_delete_objects() {
            let resource_id = LogicalId::new(format!("{id}AutoDeleteObjectsCustomResource"))?;
            let decl = ResourceDecl::new(AUTO_DELETE_RESOURCE_TYPE)
                .property("ServiceToken", provider_service_token(AUTO_DELETE_OBJECTS_PROVIDER))
                .property("BucketName", Value::reference(&id))
                .deletion_policy(DeletionPolicy::Delete)
                .update_replace_policy(DeletionPolicy::Delete);
            stack.declare_resource(resource_id.clone(), decl)?;
            Some(resource_id)
        } else {
            None
        };

        Ok((
            id,
            BucketAttrs {
                teardown: self.teardown,
                versioned: self.versioned,
                encryption: self.encryption,
                auto_delete,
            },
        ))
    }
}

impl Handle<Bucket> {
    /// Bucket name, resolved at apply time.
    #[must_use]
    pub fn bucket_name(&self) -> Value {
        Value::reference(self.id())
    }

    /// Bucket ARN.
    #[must_use]
    pub fn arn(&self) -> Value {
        Value::get_att(self.id(), "Arn")
    }

    /// Region-specific bucket domain name.
    #[must_use]
    pub fn regional_domain_name(&self) -> Value {
        Value::get_att(self.id(), "RegionalDomainName")
    }

    /// Grant an origin access identity read access to the bucket.
    ///
    /// The bucket itself stays private; the returned grant is what a
    /// distribution origin is built from.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket already has a policy.
    pub fn grant_read(
        &self,
        stack: &mut StackBuilder,
        identity: &Handle<OriginAccessIdentity>,
    ) -> StackResult<Handle<BucketPolicy>> {
        stack.add(
            &format!("{}Policy", self.id()),
            BucketPolicy {
                bucket: self.clone(),
                identity: identity.clone(),
            },
        )
    }
}

/// The parties a bucket policy grants access to.
#[derive(Debug, Clone)]
pub struct GrantAttrs {
    /// The bucket.
    pub bucket: Handle<Bucket>,
    /// The grantee.
    pub identity: Handle<OriginAccessIdentity>,
}

/// Read access for an origin access identity.
#[derive(Debug, Clone)]
pub struct BucketPolicy {
    bucket: Handle<Bucket>,
    identity: Handle<OriginAccessIdentity>,
}

impl Construct for BucketPolicy {
    type Attrs = GrantAttrs;

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, GrantAttrs)> {
        let statement = Value::map([
            ("Action", Value::list(READ_ACTIONS.map(Value::from))),
            ("Effect", Value::str("Allow")),
            (
                "Principal",
                Value::map([("CanonicalUser", self.identity.s3_canonical_user_id())]),
            ),
            (
                "Resource",
                Value::list([
                    self.bucket.arn(),
                    Value::join("", [self.bucket.arn(), Value::str("/*")]),
                ]),
            ),
        ]);
        let decl = ResourceDecl::new("AWS::S3::BucketPolicy")
            .property("Bucket", self.bucket.bucket_name())
            .property("PolicyDocument", policy_document(vec![statement]));
        stack.declare_resource(id.clone(), decl)?;

        Ok((
            id,
            GrantAttrs {
                bucket: self.bucket,
                identity: self.identity,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackError;

    #[test]
    fn test_should_pair_auto_delete_with_delete_policy() {
        for teardown in [TeardownPolicy::Retain, TeardownPolicy::DestroyWithContents] {
            let mut stack = StackBuilder::new("Test", None);
            stack
                .add("Site", Bucket::builder().teardown(teardown).build())
                .unwrap();
            let declared = stack.finish().unwrap();

            let bucket = declared.template.resource("Site").unwrap();
            let has_auto_delete = declared
                .template
                .resources_of_type(AUTO_DELETE_RESOURCE_TYPE)
                .count()
                == 1;
            let deletes = bucket.get_deletion_policy() == Some(DeletionPolicy::Delete);
            assert_eq!(has_auto_delete, deletes, "{teardown:?}");
            assert_eq!(bucket.get_update_replace_policy(), bucket.get_deletion_policy());
        }
    }

    #[test]
    fn test_should_render_versioning_and_encryption() {
        let mut stack = StackBuilder::new("Test", None);
        stack
            .add(
                "Site",
                Bucket::builder()
                    .versioned(true)
                    .encryption(BucketEncryption::S3Managed)
                    .build(),
            )
            .unwrap();
        let declared = stack.finish().unwrap();
        let json = serde_json::to_value(declared.template.resource("Site").unwrap()).unwrap();
        assert_eq!(json["Properties"]["VersioningConfiguration"]["Status"], "Enabled");
        assert_eq!(
            json["Properties"]["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]
                ["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
            "AES256"
        );
    }

    #[test]
    fn test_should_omit_encryption_when_unencrypted() {
        let mut stack = StackBuilder::new("Test", None);
        stack.add("Site", Bucket::default()).unwrap();
        let declared = stack.finish().unwrap();
        assert!(declared.template.resource("Site").unwrap().get("BucketEncryption").is_none());
    }

    #[test]
    fn test_should_reject_invalid_bucket_name() {
        let mut stack = StackBuilder::new("Test", None);
        let err = stack
            .add("Site", Bucket::builder().bucket_name("Not_Valid").build())
            .unwrap_err();
        assert!(matches!(err, StackError::InvalidConstruct { .. }));
    }

    #[test]
    fn test_should_grant_read_to_access_identity() {
        let mut stack = StackBuilder::new("Test", None);
        let bucket = stack.add("Site", Bucket::default()).unwrap();
        let identity = stack
            .add("SiteOAI", OriginAccessIdentity::new("docs"))
            .unwrap();
        let grant = bucket.grant_read(&mut stack, &identity).unwrap();
        assert_eq!(grant.id().as_str(), "SitePolicy");

        let declared = stack.finish().unwrap();
        let json = serde_json::to_value(declared.template.resource("SitePolicy").unwrap()).unwrap();
        let statement = &json["Properties"]["PolicyDocument"]["Statement"][0];
        assert_eq!(
            statement["Action"],
            serde_json::json!(["s3:GetObject*", "s3:GetBucket*", "s3:List*"])
        );
        assert_eq!(
            statement["Principal"]["CanonicalUser"]["Fn::GetAtt"],
            serde_json::json!(["SiteOAI", "S3CanonicalUserId"])
        );
    }
}
