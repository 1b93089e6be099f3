//! Resource declarations.

use std::collections::{BTreeMap, BTreeSet};

use apistack_core::LogicalId;
use serde::Serialize;

use crate::intrinsic::Value;

/// What CloudFormation does with a resource when it is removed or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletionPolicy {
    /// Delete the physical resource.
    Delete,
    /// Keep the physical resource.
    Retain,
    /// Snapshot, then delete (only for snapshot-capable resources).
    Snapshot,
}

/// A declared CloudFormation resource.
///
/// # Examples
///
/// ```
/// use apistack_template::{DeletionPolicy, ResourceDecl, Value};
///
/// let bucket = ResourceDecl::new("AWS::S3::Bucket")
///     .property("VersioningConfiguration", Value::map([("Status", "Enabled".into())]))
///     .deletion_policy(DeletionPolicy::Delete);
/// assert_eq!(bucket.resource_type(), "AWS::S3::Bucket");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDecl {
    #[serde(rename = "Type")]
    resource_type: String,
    #[serde(rename = "Properties", skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, Value>,
    #[serde(rename = "DependsOn", skip_serializing_if = "BTreeSet::is_empty")]
    depends_on: BTreeSet<LogicalId>,
    #[serde(rename = "UpdateReplacePolicy", skip_serializing_if = "Option::is_none")]
    update_replace_policy: Option<DeletionPolicy>,
    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none")]
    deletion_policy: Option<DeletionPolicy>,
}

impl ResourceDecl {
    /// Start a declaration of the given resource type.
    #[must_use]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            update_replace_policy: None,
            deletion_policy: None,
        }
    }

    /// Set a property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a property only when a value is present.
    #[must_use]
    pub fn property_opt(self, key: impl Into<String>, value: Option<Value>) -> Self {
        match value {
            Some(v) => self.property(key, v),
            None => self,
        }
    }

    /// Add an explicit `DependsOn` entry.
    #[must_use]
    pub fn depends_on(mut self, id: &LogicalId) -> Self {
        self.depends_on.insert(id.clone());
        self
    }

    /// Set the `DeletionPolicy`.
    #[must_use]
    pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    /// Set the `UpdateReplacePolicy`.
    #[must_use]
    pub fn update_replace_policy(mut self, policy: DeletionPolicy) -> Self {
        self.update_replace_policy = Some(policy);
        self
    }

    /// The CloudFormation resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Look up a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// All properties.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Explicit `DependsOn` entries.
    #[must_use]
    pub fn explicit_dependencies(&self) -> &BTreeSet<LogicalId> {
        &self.depends_on
    }

    /// The `DeletionPolicy`, if set.
    #[must_use]
    pub fn get_deletion_policy(&self) -> Option<DeletionPolicy> {
        self.deletion_policy
    }

    /// The `UpdateReplacePolicy`, if set.
    #[must_use]
    pub fn get_update_replace_policy(&self) -> Option<DeletionPolicy> {
        self.update_replace_policy
    }

    /// Every node this resource needs to exist first: implicit references
    /// found in properties plus explicit `DependsOn` entries.
    #[must_use]
    pub fn references(&self) -> BTreeSet<LogicalId> {
        let mut out = self.depends_on.clone();
        for value in self.properties.values() {
            out.extend(value.references());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    #[test]
    fn test_should_serialize_resource_with_policies() {
        let decl = ResourceDecl::new("AWS::S3::Bucket")
            .property("VersioningConfiguration", Value::map([("Status", "Enabled".into())]))
            .update_replace_policy(DeletionPolicy::Delete)
            .deletion_policy(DeletionPolicy::Delete);

        assert_eq!(
            serde_json::to_value(&decl).unwrap(),
            json!({
                "Type": "AWS::S3::Bucket",
                "Properties": {"VersioningConfiguration": {"Status": "Enabled"}},
                "UpdateReplacePolicy": "Delete",
                "DeletionPolicy": "Delete"
            })
        );
    }

    #[test]
    fn test_should_omit_empty_sections() {
        let decl = ResourceDecl::new("AWS::CloudFront::CloudFrontOriginAccessIdentity");
        assert_eq!(
            serde_json::to_value(&decl).unwrap(),
            json!({"Type": "AWS::CloudFront::CloudFrontOriginAccessIdentity"})
        );
    }

    #[test]
    fn test_should_merge_implicit_and_explicit_references() {
        let decl = ResourceDecl::new("AWS::CloudFront::Distribution")
            .property("Origin", Value::get_att(&id("Bucket"), "RegionalDomainName"))
            .depends_on(&id("BucketPolicy"));

        let refs: Vec<String> = decl.references().iter().map(ToString::to_string).collect();
        assert_eq!(refs, vec!["Bucket", "BucketPolicy"]);
        assert_eq!(
            serde_json::to_value(&decl).unwrap()["DependsOn"],
            json!(["BucketPolicy"])
        );
    }

    #[test]
    fn test_should_skip_absent_optional_property() {
        let decl = ResourceDecl::new("AWS::S3::Bucket").property_opt("BucketEncryption", None);
        assert!(decl.get("BucketEncryption").is_none());
        assert!(decl.properties().is_empty());
    }
}
