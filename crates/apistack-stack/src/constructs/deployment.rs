//! Deploying a bundled directory asset into a bucket.

use std::fmt;
use std::time::Duration;

use apistack_core::LogicalId;
use apistack_template::{ResourceDecl, Value};
use typed_builder::TypedBuilder;

use super::assets::DirectoryAsset;
use super::cloudfront::Distribution;
use super::s3::Bucket;
use super::{BUCKET_DEPLOYMENT_PROVIDER, invalid, provider_service_token};
use crate::builder::{Construct, Handle, StackBuilder};
use crate::error::StackResult;

/// Custom resource type of a bucket deployment.
pub const BUCKET_DEPLOYMENT_RESOURCE_TYPE: &str = "Custom::CDKBucketDeployment";

/// A `Cache-Control` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheControl {
    /// `public`
    Public,
    /// `private`
    Private,
    /// `no-cache`
    NoCache,
    /// `must-revalidate`
    MustRevalidate,
    /// `max-age=<seconds>`
    MaxAge(Duration),
    /// `s-maxage=<seconds>`
    SMaxAge(Duration),
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
            Self::NoCache => f.write_str("no-cache"),
            Self::MustRevalidate => f.write_str("must-revalidate"),
            Self::MaxAge(d) => write!(f, "max-age={}", d.as_secs()),
            Self::SMaxAge(d) => write!(f, "s-maxage={}", d.as_secs()),
        }
    }
}

impl CacheControl {
    /// Render directives as a header value, in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use apistack_stack::constructs::deployment::CacheControl;
    ///
    /// let value = CacheControl::header_value(&[
    ///     CacheControl::Public,
    ///     CacheControl::MaxAge(Duration::ZERO),
    ///     CacheControl::SMaxAge(Duration::ZERO),
    /// ]);
    /// assert_eq!(value, "public, max-age=0, s-maxage=0");
    /// ```
    #[must_use]
    pub fn header_value(directives: &[CacheControl]) -> String {
        directives
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Copies bundled assets into a bucket and invalidates a distribution.
#[derive(Debug, Clone, TypedBuilder)]
pub struct BucketDeployment {
    /// Assets whose contents are copied.
    sources: Vec<Handle<DirectoryAsset>>,

    /// Destination bucket.
    destination: Handle<Bucket>,

    /// Distribution to invalidate after copying.
    #[builder(default, setter(strip_option))]
    distribution: Option<Handle<Distribution>>,

    /// Paths to invalidate.
    #[builder(default)]
    distribution_paths: Vec<String>,

    /// Delete destination objects that are not in the sources.
    #[builder(default = true)]
    prune: bool,

    /// `Cache-Control` set on every copied object.
    #[builder(default)]
    cache_control: Vec<CacheControl>,
}

impl BucketDeployment {
    fn validate(&self, id: &LogicalId) -> StackResult<()> {
        if self.sources.is_empty() {
            return Err(invalid(id, "at least one source is required"));
        }
        if !self.distribution_paths.is_empty() && self.distribution.is_none() {
            return Err(invalid(id, "distribution paths require a distribution"));
        }
        if let Some(path) = self.distribution_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid(id, format!("distribution path {path} must start with '/'")));
        }
        Ok(())
    }
}

impl Construct for BucketDeployment {
    type Attrs = ();

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, ())> {
        self.validate(&id)?;

        let source_buckets = self.sources.iter().map(|s| s.attrs().bucket_name());
        let source_keys = self.sources.iter().map(|s| s.attrs().object_key_value());
        let metadata = (!self.cache_control.is_empty()).then(|| {
            Value::map([(
                "cache-control",
                Value::str(CacheControl::header_value(&self.cache_control)),
            )])
        });
        let paths = (!self.distribution_paths.is_empty())
            .then(|| Value::list(self.distribution_paths.iter().map(|p| Value::str(p))));

        let decl = ResourceDecl::new(BUCKET_DEPLOYMENT_RESOURCE_TYPE)
            .property("ServiceToken", provider_service_token(BUCKET_DEPLOYMENT_PROVIDER))
            .property("SourceBucketNames", Value::list(source_buckets))
            .property("SourceObjectKeys", Value::list(source_keys))
            .property("DestinationBucketName", self.destination.bucket_name())
            .property("Prune", self.prune)
            .property_opt("SystemMetadata", metadata)
            .property_opt(
                "DistributionId",
                self.distribution.as_ref().map(|d| d.distribution_id()),
            )
            .property_opt("DistributionPaths", paths);

        let after: Vec<&LogicalId> = self.sources.iter().map(|s| s.id()).collect();
        stack.declare_resource_after(id.clone(), decl, &after)?;
        Ok((id, ()))
    }
}
