//! Origin access identities and web distributions.

use apistack_core::LogicalId;
use apistack_template::{ResourceDecl, Value};
use typed_builder::TypedBuilder;

use super::s3::BucketPolicy;
use crate::builder::{Construct, Handle, StackBuilder};
use crate::error::StackResult;

/// Id of the single origin of a distribution.
const ORIGIN_ID: &str = "origin1";

/// A CloudFront identity that S3 can grant read access to.
#[derive(Debug, Clone)]
pub struct OriginAccessIdentity {
    comment: String,
}

impl OriginAccessIdentity {
    /// An identity with a descriptive comment.
    #[must_use]
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
        }
    }
}

impl Construct for OriginAccessIdentity {
    type Attrs = ();

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, ())> {
        let decl = ResourceDecl::new("AWS::CloudFront::CloudFrontOriginAccessIdentity").property(
            "CloudFrontOriginAccessIdentityConfig",
            Value::map([("Comment", Value::str(self.comment))]),
        );
        stack.declare_resource(id.clone(), decl)?;
        Ok((id, ()))
    }
}

impl Handle<OriginAccessIdentity> {
    /// Canonical user id used as the principal in bucket policies.
    #[must_use]
    pub fn s3_canonical_user_id(&self) -> Value {
        Value::get_att(self.id(), "S3CanonicalUserId")
    }

    /// `origin-access-identity/cloudfront/<id>` path used in origin config.
    #[must_use]
    pub fn origin_access_identity_path(&self) -> Value {
        Value::join(
            "",
            [
                Value::str("origin-access-identity/cloudfront/"),
                Value::reference(self.id()),
            ],
        )
    }
}

/// A private bucket origin reached through an origin access identity.
///
/// Built from the read grant, so the grant always exists before any
/// distribution that uses the origin.
#[derive(Debug, Clone)]
pub struct S3Origin {
    grant: Handle<BucketPolicy>,
}

impl S3Origin {
    /// Origin for the bucket and identity of `grant`.
    #[must_use]
    pub fn new(grant: &Handle<BucketPolicy>) -> Self {
        Self {
            grant: grant.clone(),
        }
    }

    fn render(&self) -> Value {
        let grant = self.grant.attrs();
        Value::map([
            ("DomainName", grant.bucket.regional_domain_name()),
            ("Id", Value::str(ORIGIN_ID)),
            (
                "S3OriginConfig",
                Value::map([(
                    "OriginAccessIdentity",
                    grant.identity.origin_access_identity_path(),
                )]),
            ),
        ])
    }
}

/// Edge coverage: North America and Europe.
const PRICE_CLASS: &str = "PriceClass_100";

/// A web distribution with one S3 origin and only the default behavior.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Distribution {
    /// The sole origin.
    origin: S3Origin,

    /// Object served for requests to `/`.
    #[builder(default = String::from("index.html"), setter(into))]
    default_root_object: String,
}

fn default_behavior() -> Value {
    let methods = || Value::list([Value::str("GET"), Value::str("HEAD")]);
    Value::map([
        ("AllowedMethods", methods()),
        ("CachedMethods", methods()),
        ("Compress", Value::Bool(true)),
        (
            "ForwardedValues",
            Value::map([
                ("Cookies", Value::map([("Forward", Value::str("none"))])),
                ("QueryString", Value::Bool(false)),
            ]),
        ),
        ("TargetOriginId", Value::str(ORIGIN_ID)),
        ("ViewerProtocolPolicy", Value::str("redirect-to-https")),
    ])
}

impl Construct for Distribution {
    type Attrs = ();

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, ())> {
        let config = Value::map([
            ("DefaultCacheBehavior", default_behavior()),
            ("DefaultRootObject", Value::str(self.default_root_object)),
            ("Enabled", Value::Bool(true)),
            ("HttpVersion", Value::str("http2")),
            ("IPV6Enabled", Value::Bool(true)),
            ("Origins", Value::list([self.origin.render()])),
            ("PriceClass", Value::str(PRICE_CLASS)),
        ]);
        let decl = ResourceDecl::new("AWS::CloudFront::Distribution")
            .property("DistributionConfig", config)
            .depends_on(self.origin.grant.id());
        stack.declare_resource(id.clone(), decl)?;
        Ok((id, ()))
    }
}

impl Handle<Distribution> {
    /// Distribution id.
    #[must_use]
    pub fn distribution_id(&self) -> Value {
        Value::reference(self.id())
    }

    /// `*.cloudfront.net` domain name.
    #[must_use]
    pub fn domain_name(&self) -> Value {
        Value::get_att(self.id(), "DomainName")
    }
}
