//! In-memory bucket used to simulate deployments.
//!
//! Only the behavior the deployment action relies on is modelled: keyed
//! objects with MD5 ETags and `Cache-Control` metadata, optional
//! versioning with delete markers, and teardown according to the bucket's
//! [`TeardownPolicy`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use apistack_core::BucketEncryption;
use apistack_template::{DeletionPolicy, ResourceDecl, Value};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use digest::Digest;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{DeployError, DeployResult};
use crate::constructs::s3::TeardownPolicy;

/// Compute the quoted hex MD5 of `data`, as returned in an S3 ETag.
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(md5::Md5::digest(data)))
}

/// A stored object version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object key.
    pub key: String,
    /// Version id, `None` when the bucket is not versioned.
    pub version_id: Option<String>,
    /// Object body.
    pub body: Bytes,
    /// Quoted MD5 ETag.
    pub etag: String,
    /// `Cache-Control` system metadata.
    pub cache_control: Option<String>,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Version {
    Object(StoredObject),
    DeleteMarker,
}

impl Version {
    fn as_object(&self) -> Option<&StoredObject> {
        match self {
            Self::Object(object) => Some(object),
            Self::DeleteMarker => None,
        }
    }
}

/// What teardown did to a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The bucket was emptied and deleted.
    Destroyed {
        /// Object versions and delete markers removed.
        removed: usize,
    },
    /// The bucket and its contents were left in place.
    Retained {
        /// Objects still visible.
        objects: usize,
    },
}

/// An in-memory bucket.
#[derive(Debug)]
pub struct SimulatedBucket {
    name: String,
    versioned: bool,
    encryption: BucketEncryption,
    teardown: TeardownPolicy,
    /// Versions per key, newest first.
    objects: RwLock<BTreeMap<String, Vec<Version>>>,
    /// Bumped on every change to the visible content.
    revision: AtomicU64,
    deleted: RwLock<bool>,
}

impl SimulatedBucket {
    /// Create an empty bucket.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        versioned: bool,
        encryption: BucketEncryption,
        teardown: TeardownPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            versioned,
            encryption,
            teardown,
            objects: RwLock::new(BTreeMap::new()),
            revision: AtomicU64::new(0),
            deleted: RwLock::new(false),
        }
    }

    /// Create the bucket a synthesized `AWS::S3::Bucket` declaration
    /// describes.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::UnexpectedResourceType`] for other resource
    /// types, or [`DeployError::MissingProperty`] for an unknown encryption
    /// algorithm.
    pub fn from_declaration(name: impl Into<String>, decl: &ResourceDecl) -> DeployResult<Self> {
        if decl.resource_type() != "AWS::S3::Bucket" {
            return Err(DeployError::UnexpectedResourceType {
                expected: "AWS::S3::Bucket".to_owned(),
                found: decl.resource_type().to_owned(),
            });
        }

        let versioned = decl
            .get("VersioningConfiguration")
            .and_then(|v| v.get("Status"))
            .and_then(Value::as_str)
            == Some("Enabled");

        let algorithm = decl
            .get("BucketEncryption")
            .and_then(|e| e.get("ServerSideEncryptionConfiguration"))
            .and_then(Value::as_list)
            .and_then(<[Value]>::first)
            .and_then(|rule| rule.get("ServerSideEncryptionByDefault"))
            .and_then(|d| d.get("SSEAlgorithm"))
            .and_then(Value::as_str);
        let encryption = match algorithm {
            None => BucketEncryption::Unencrypted,
            Some(algorithm) => [BucketEncryption::S3Managed, BucketEncryption::KmsManaged]
                .into_iter()
                .find(|e| e.sse_algorithm() == Some(algorithm))
                .ok_or_else(|| DeployError::MissingProperty {
                    resource: decl.resource_type().to_owned(),
                    property: format!("BucketEncryption ({algorithm})"),
                })?,
        };

        let teardown = if decl.get_deletion_policy() == Some(DeletionPolicy::Delete) {
            TeardownPolicy::DestroyWithContents
        } else {
            TeardownPolicy::Retain
        };

        Ok(Self::new(name, versioned, encryption, teardown))
    }

    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether versioning is enabled.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    /// Server-side encryption.
    #[must_use]
    pub fn encryption(&self) -> BucketEncryption {
        self.encryption
    }

    /// Teardown behavior.
    #[must_use]
    pub fn teardown_policy(&self) -> TeardownPolicy {
        self.teardown
    }

    /// Whether the bucket has been deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        *self.deleted.read()
    }

    /// Counter of content changes. Equal revisions mean no object was
    /// stored or deleted in between.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Store an object, returning the stored version.
    pub fn put_object(&self, key: &str, body: Bytes, cache_control: Option<&str>) -> StoredObject {
        let object = StoredObject {
            key: key.to_owned(),
            version_id: self.versioned.then(|| Uuid::new_v4().to_string()),
            etag: compute_etag(&body),
            body,
            cache_control: cache_control.map(str::to_owned),
            last_modified: Utc::now(),
        };
        debug!(bucket = %self.name, key, etag = %object.etag, "storing object");

        let mut objects = self.objects.write();
        let versions = objects.entry(key.to_owned()).or_default();
        if self.versioned {
            versions.insert(0, Version::Object(object.clone()));
        } else {
            *versions = vec![Version::Object(object.clone())];
        }
        self.revision.fetch_add(1, Ordering::AcqRel);
        object
    }

    /// The current version of an object, if it exists.
    #[must_use]
    pub fn head_object(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .get(key)
            .and_then(|versions| versions.first())
            .and_then(Version::as_object)
            .cloned()
    }

    /// The current body of an object.
    #[must_use]
    pub fn get_object(&self, key: &str) -> Option<Bytes> {
        self.head_object(key).map(|object| object.body)
    }

    /// Delete an object. Versioned buckets keep history behind a delete
    /// marker. Returns whether a visible object was deleted.
    pub fn delete_object(&self, key: &str) -> bool {
        let mut objects = self.objects.write();
        let existed = objects
            .get(key)
            .and_then(|versions| versions.first())
            .is_some_and(|latest| latest.as_object().is_some());

        if self.versioned {
            if existed {
                objects
                    .entry(key.to_owned())
                    .or_default()
                    .insert(0, Version::DeleteMarker);
            }
        } else {
            objects.remove(key);
        }
        if existed {
            self.revision.fetch_add(1, Ordering::AcqRel);
        }
        debug!(bucket = %self.name, key, existed, "deleted object");
        existed
    }

    /// Keys of all visible objects, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .iter()
            .filter(|(_, versions)| versions.first().and_then(Version::as_object).is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of stored versions (including delete markers) of a key.
    #[must_use]
    pub fn version_count(&self, key: &str) -> usize {
        self.objects.read().get(key).map_or(0, Vec::len)
    }

    /// Whether the bucket holds no versions or delete markers at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Delete the bucket itself.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::BucketNotEmpty`] if any version remains.
    pub fn delete_bucket(&self) -> DeployResult<()> {
        if !self.is_empty() {
            return Err(DeployError::BucketNotEmpty(self.name.clone()));
        }
        *self.deleted.write() = true;
        Ok(())
    }

    /// Tear the bucket down as the stack deletion would.
    ///
    /// # Errors
    ///
    /// Not expected: a destroyed bucket is emptied before it is deleted.
    pub fn teardown(&self) -> DeployResult<TeardownOutcome> {
        match self.teardown {
            TeardownPolicy::Retain => {
                let objects = self.keys().len();
                info!(bucket = %self.name, objects, "retaining bucket on teardown");
                Ok(TeardownOutcome::Retained { objects })
            }
            TeardownPolicy::DestroyWithContents => {
                let removed = {
                    let mut objects = self.objects.write();
                    let removed = objects.values().map(Vec::len).sum();
                    objects.clear();
                    self.revision.fetch_add(1, Ordering::AcqRel);
                    removed
                };
                self.delete_bucket()?;
                info!(bucket = %self.name, removed, "destroyed bucket with contents");
                Ok(TeardownOutcome::Destroyed { removed })
            }
        }
    }
}
