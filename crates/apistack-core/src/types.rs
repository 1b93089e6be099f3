//! Common identifier and setting types shared across the stack.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::validation::{validate_logical_id, validate_stage_name};

/// AWS Account ID (12-digit string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Placeholder account used when no target environment is configured.
    pub const DEFAULT: &str = "000000000000";

    /// Create a new account ID from a string.
    ///
    /// # Errors
    /// Returns an error if the account ID is not a 12-digit numeric string.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.len() != 12 || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::InvalidAccountId(id));
        }
        Ok(Self(id))
    }

    /// Get the account ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// AWS Region identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Default region.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A CloudFormation logical ID: the stable name of a node in the template.
///
/// Logical IDs are alphanumeric and at most 255 characters long. They are
/// ordered by their string value so they can be used as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Create a validated logical ID.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidLogicalId`] if the ID is empty, too long,
    /// or contains characters other than ASCII letters and digits.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        validate_logical_id(&id)?;
        Ok(Self(id))
    }

    /// Get the logical ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LogicalId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> serde::Deserialize<'de> for LogicalId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// A named deployment slice of the gateway (e.g. `dev`, `prod`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct StageName(String);

impl StageName {
    /// Create a validated stage name.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidStageName`] if the name does not satisfy
    /// the API Gateway stage naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        validate_stage_name(&name)?;
        Ok(Self(name))
    }

    /// Get the stage name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StageName {
    fn default() -> Self {
        Self("dev".to_owned())
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for StageName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// At-rest encryption setting for the documentation bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketEncryption {
    /// No default encryption is configured.
    #[default]
    Unencrypted,
    /// SSE-S3 (`AES256`).
    S3Managed,
    /// SSE-KMS with the AWS managed key (`aws:kms`).
    KmsManaged,
}

impl BucketEncryption {
    /// Return the kebab-case name used in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unencrypted => "unencrypted",
            Self::S3Managed => "s3-managed",
            Self::KmsManaged => "kms-managed",
        }
    }

    /// The SSE algorithm written into the bucket properties, if any.
    #[must_use]
    pub fn sse_algorithm(&self) -> Option<&'static str> {
        match self {
            Self::Unencrypted => None,
            Self::S3Managed => Some("AES256"),
            Self::KmsManaged => Some("aws:kms"),
        }
    }
}

impl fmt::Display for BucketEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketEncryption {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unencrypted" | "none" => Ok(Self::Unencrypted),
            "s3-managed" | "s3" | "aes256" => Ok(Self::S3Managed),
            "kms-managed" | "kms" => Ok(Self::KmsManaged),
            other => Err(CoreError::Config(format!(
                "unknown bucket encryption: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_valid_account_id() {
        let id = AccountId::new("123456789012").unwrap();
        assert_eq!(id.as_str(), "123456789012");
    }

    #[test]
    fn test_should_reject_invalid_account_id() {
        assert!(AccountId::new("12345").is_err());
        assert!(AccountId::new("abcdefghijkl").is_err());
        assert!(AccountId::new("1234567890123").is_err());
    }

    #[test]
    fn test_should_use_default_region() {
        assert_eq!(AwsRegion::default().as_str(), "us-east-1");
    }

    #[test]
    fn test_should_accept_alphanumeric_logical_id() {
        let id: LogicalId = "APILambda".parse().unwrap();
        assert_eq!(id.to_string(), "APILambda");
    }

    #[test]
    fn test_should_reject_logical_id_with_separator() {
        assert!(LogicalId::new("api-lambda").is_err());
        assert!(LogicalId::new("").is_err());
    }

    #[test]
    fn test_should_deserialize_stage_name_with_validation() {
        let ok: StageName = serde_json::from_str("\"prod\"").unwrap();
        assert_eq!(ok.as_str(), "prod");
        assert!(serde_json::from_str::<StageName>("\"no spaces\"").is_err());
    }

    #[test]
    fn test_should_parse_bucket_encryption() {
        assert_eq!(
            "unencrypted".parse::<BucketEncryption>().unwrap(),
            BucketEncryption::Unencrypted
        );
        assert_eq!(
            "S3".parse::<BucketEncryption>().unwrap(),
            BucketEncryption::S3Managed
        );
        assert!("rot13".parse::<BucketEncryption>().is_err());
        assert_eq!(BucketEncryption::Unencrypted.sse_algorithm(), None);
        assert_eq!(BucketEncryption::KmsManaged.sse_algorithm(), Some("aws:kms"));
    }
}
