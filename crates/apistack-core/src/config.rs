//! Stack configuration.
//!
//! Provides [`StackConfig`], the small configuration struct the whole stack
//! descriptor is a function of. Values are loaded from environment variables
//! with defaults matching the usual project layout (application in
//! `../app/`, API definition and documentation sources in `../api`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{CoreError, CoreResult};
use crate::types::{AccountId, AwsRegion, BucketEncryption, StageName};

/// Stack configuration.
///
/// # Examples
///
/// ```
/// use apistack_core::StackConfig;
///
/// let config = StackConfig::default();
/// assert_eq!(config.stage_name.as_str(), "dev");
/// assert!(config.enable_docs);
/// assert!(config.continue_on_doc_image_failure);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct StackConfig {
    /// Name of the stack, used for output file names.
    #[builder(default = String::from("OpenAPIBlogStack"))]
    pub stack_name: String,

    /// API Gateway stage the REST API is deployed into.
    #[builder(default)]
    pub stage_name: StageName,

    /// Application source directory compiled into the function package.
    #[builder(default = PathBuf::from("../app/"))]
    pub app_source_dir: PathBuf,

    /// Machine-readable API definition (OpenAPI document).
    #[builder(default = PathBuf::from("../api/openapi.yaml"))]
    pub api_definition_path: PathBuf,

    /// Directory mounted as input of the documentation build.
    #[builder(default = PathBuf::from("../api"))]
    pub doc_source_dir: PathBuf,

    /// Docker build context of the documentation image.
    #[builder(default = PathBuf::from("../api/docker"))]
    pub doc_build_context: PathBuf,

    /// Host-side dependency cache mounted into the function build.
    #[builder(default = default_dependency_cache_dir())]
    pub dependency_cache_dir: PathBuf,

    /// Whether the documentation pipeline is declared at all.
    #[builder(default = true)]
    pub enable_docs: bool,

    /// Keep going when the documentation image fails to build.
    #[builder(default = true)]
    pub continue_on_doc_image_failure: bool,

    /// At-rest encryption of the documentation bucket.
    #[builder(default)]
    pub bucket_encryption: BucketEncryption,

    /// Target account, used for asset destinations and simulation.
    #[builder(default)]
    pub account: AccountId,

    /// Target region, used for asset destinations and simulation.
    #[builder(default)]
    pub region: AwsRegion,

    /// Output directory for the synthesized cloud assembly.
    #[builder(default = PathBuf::from("cdk.out"))]
    pub outdir: PathBuf,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StackConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `STACK_NAME` | `OpenAPIBlogStack` |
    /// | `STAGE_NAME` | `dev` |
    /// | `APP_SOURCE_DIR` | `../app/` |
    /// | `API_DEFINITION_PATH` | `../api/openapi.yaml` |
    /// | `DOC_SOURCE_DIR` | `../api` |
    /// | `DOC_BUILD_CONTEXT` | `../api/docker` |
    /// | `DEPENDENCY_CACHE_DIR` | `$HOME/.m2/` |
    /// | `ENABLE_DOCS` | `true` |
    /// | `CONTINUE_ON_DOC_IMAGE_FAILURE` | `true` |
    /// | `BUCKET_ENCRYPTION` | `unencrypted` |
    /// | `DEFAULT_ACCOUNT` | `000000000000` |
    /// | `DEFAULT_REGION` | `us-east-1` |
    /// | `OUTDIR` | `cdk.out` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that fails
    /// validation (stage name, account ID, encryption setting).
    pub fn from_env() -> CoreResult<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("STACK_NAME") {
            config.stack_name = v;
        }
        if let Ok(v) = std::env::var("STAGE_NAME") {
            config.stage_name = StageName::new(v)?;
        }
        if let Ok(v) = std::env::var("APP_SOURCE_DIR") {
            config.app_source_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("API_DEFINITION_PATH") {
            config.api_definition_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOC_SOURCE_DIR") {
            config.doc_source_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOC_BUILD_CONTEXT") {
            config.doc_build_context = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DEPENDENCY_CACHE_DIR") {
            config.dependency_cache_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ENABLE_DOCS") {
            config.enable_docs = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("CONTINUE_ON_DOC_IMAGE_FAILURE") {
            config.continue_on_doc_image_failure = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("BUCKET_ENCRYPTION") {
            config.bucket_encryption = v.parse()?;
        }
        if let Ok(v) = std::env::var("DEFAULT_ACCOUNT") {
            config.account = AccountId::new(v)?;
        }
        if let Ok(v) = std::env::var("DEFAULT_REGION") {
            config.region = AwsRegion::new(v);
        }
        if let Ok(v) = std::env::var("OUTDIR") {
            config.outdir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that the field types cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the stack name is empty.
    pub fn validate(&self) -> CoreResult<()> {
        if self.stack_name.trim().is_empty() {
            return Err(CoreError::Config("stack name must not be empty".to_owned()));
        }
        Ok(())
    }
}

/// Default Maven repository location on the build host.
fn default_dependency_cache_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_owned());
    PathBuf::from(format!("{home}/.m2/"))
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = StackConfig::default();
        assert_eq!(config.stack_name, "OpenAPIBlogStack");
        assert_eq!(config.stage_name.as_str(), "dev");
        assert_eq!(config.app_source_dir, PathBuf::from("../app/"));
        assert_eq!(config.api_definition_path, PathBuf::from("../api/openapi.yaml"));
        assert_eq!(config.doc_build_context, PathBuf::from("../api/docker"));
        assert!(config.dependency_cache_dir.ends_with(".m2"));
        assert!(config.enable_docs);
        assert!(config.continue_on_doc_image_failure);
        assert_eq!(config.bucket_encryption, BucketEncryption::Unencrypted);
        assert_eq!(config.outdir, PathBuf::from("cdk.out"));
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = StackConfig::builder()
            .stack_name("DocsStack".into())
            .stage_name(StageName::new("prod").unwrap())
            .enable_docs(false)
            .continue_on_doc_image_failure(false)
            .bucket_encryption(BucketEncryption::S3Managed)
            .region(AwsRegion::new("eu-west-1"))
            .build();

        assert_eq!(config.stack_name, "DocsStack");
        assert_eq!(config.stage_name.as_str(), "prod");
        assert!(!config.enable_docs);
        assert!(!config.continue_on_doc_image_failure);
        assert_eq!(config.bucket_encryption, BucketEncryption::S3Managed);
        assert_eq!(config.region.as_str(), "eu-west-1");
    }

    #[test]
    fn test_should_reject_empty_stack_name() {
        let config = StackConfig::builder().stack_name("  ".into()).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_should_serialize_to_camel_case_json() {
        let config = StackConfig::default();
        let json = serde_json::to_string(&config).expect("test serialization");
        assert!(json.contains("stageName"));
        assert!(json.contains("continueOnDocImageFailure"));
        assert!(json.contains("\"bucketEncryption\":\"unencrypted\""));
    }

    #[test]
    fn test_should_parse_bool_values() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
