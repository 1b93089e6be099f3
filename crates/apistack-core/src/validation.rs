//! Naming rules for the identifiers that end up in a synthesized template.
//!
//! Covers CloudFormation logical IDs, API Gateway stage names, and the S3
//! bucket names generated for physical resources, following the
//! [Amazon S3 documentation](https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html)
//! for the latter.

use std::net::Ipv4Addr;

use crate::error::CoreError;

/// Maximum logical ID length accepted by CloudFormation.
const MAX_LOGICAL_ID_LEN: usize = 255;

/// Maximum stage name length accepted by API Gateway.
const MAX_STAGE_NAME_LEN: usize = 128;

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
pub const MAX_BUCKET_NAME_LEN: usize = 63;

/// Validate a CloudFormation logical ID.
///
/// Logical IDs must be 1-255 ASCII alphanumeric characters.
///
/// # Errors
///
/// Returns [`CoreError::InvalidLogicalId`] if any rule is violated.
///
/// # Examples
///
/// ```
/// use apistack_core::validation::validate_logical_id;
///
/// assert!(validate_logical_id("OpenAPIBlogCFD").is_ok());
/// assert!(validate_logical_id("Open-API").is_err());
/// ```
pub fn validate_logical_id(id: &str) -> Result<(), CoreError> {
    let reject = |reason: &str| CoreError::InvalidLogicalId {
        id: id.to_owned(),
        reason: reason.to_owned(),
    };

    if id.is_empty() || id.len() > MAX_LOGICAL_ID_LEN {
        return Err(reject("Logical ID must be between 1 and 255 characters long"));
    }
    if !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(reject("Logical ID must only contain ASCII letters and digits"));
    }
    Ok(())
}

/// Validate an API Gateway stage name.
///
/// Stage names are 1-128 characters of ASCII letters, digits, hyphens, and
/// underscores.
///
/// # Errors
///
/// Returns [`CoreError::InvalidStageName`] if any rule is violated.
pub fn validate_stage_name(name: &str) -> Result<(), CoreError> {
    let reject = |reason: &str| CoreError::InvalidStageName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    if name.is_empty() || name.len() > MAX_STAGE_NAME_LEN {
        return Err(reject("Stage name must be between 1 and 128 characters long"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(reject(
            "Stage name must only contain letters, numbers, hyphens, and underscores",
        ));
    }
    Ok(())
}

/// Validate an S3 bucket name.
///
/// Rules (per AWS documentation):
/// - 3-63 characters long
/// - Only lowercase letters, numbers, hyphens, and dots
/// - Must start and end with a letter or number
/// - No consecutive dots (`..`)
/// - Not formatted as an IPv4 address (e.g. `192.168.0.1`)
/// - Must not start with `xn--` or `sthree-`
/// - Must not end with `-s3alias`
///
/// # Errors
///
/// Returns [`CoreError::InvalidBucketName`] if any rule is violated.
///
/// # Examples
///
/// ```
/// use apistack_core::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("openapiblogstack-openapiblogapibucket-1x2y3z").is_ok());
/// assert!(validate_bucket_name("AB").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> Result<(), CoreError> {
    let reject = |reason: &str| CoreError::InvalidBucketName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };
    let len = name.len();

    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(reject("Bucket name must be between 3 and 63 characters long"));
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(reject(
            "Bucket name must only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    let first = name.as_bytes()[0];
    let last = name.as_bytes()[len - 1];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit())
        || !(last.is_ascii_lowercase() || last.is_ascii_digit())
    {
        return Err(reject("Bucket name must start and end with a letter or number"));
    }

    if name.contains("..") {
        return Err(reject("Bucket name must not contain consecutive dots"));
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(reject("Bucket name must not be formatted as an IP address"));
    }

    if name.starts_with("xn--") || name.starts_with("sthree-") {
        return Err(reject("Bucket name must not use a reserved prefix"));
    }

    if name.ends_with("-s3alias") {
        return Err(reject("Bucket name must not end with '-s3alias'"));
    }

    Ok(())
}
