//! Applying a bucket deployment to a simulated bucket and distribution.
//!
//! Mirrors what the deployment custom resource does on apply: unpack the
//! staged archive, copy every entry into the destination with the
//! configured `Cache-Control`, prune keys that are no longer present, and
//! invalidate the distribution. The invalidation caller reference is
//! derived from the deployed content, so applying the same artifact twice
//! reuses the first invalidation.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path};

use apistack_template::{ResourceDecl, Value};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::info;

use super::bucket::{SimulatedBucket, compute_etag};
use super::distribution::{Invalidation, SimulatedDistribution};
use super::error::{DeployError, DeployResult};
use crate::constructs::deployment::BUCKET_DEPLOYMENT_RESOURCE_TYPE;

/// Entries of an unpacked artifact, keyed by object key.
pub type Artifact = BTreeMap<String, Bytes>;

/// What a deployment changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    /// Keys whose content or metadata changed.
    pub uploaded: Vec<String>,
    /// Keys already up to date.
    pub unchanged: Vec<String>,
    /// Keys deleted because they are not in the artifact.
    pub pruned: Vec<String>,
    /// The invalidation covering this content, if a distribution is set.
    pub invalidation: Option<Invalidation>,
    /// Whether the invalidation was created by this run.
    pub invalidation_created: bool,
}

impl DeploymentReport {
    /// Whether the run changed nothing at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.uploaded.is_empty() && self.pruned.is_empty() && !self.invalidation_created
    }
}

/// The settings of one `Custom::CDKBucketDeployment` resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDeploymentAction {
    prune: bool,
    cache_control: Option<String>,
    distribution_paths: Vec<String>,
}

impl BucketDeploymentAction {
    /// An action with explicit settings.
    #[must_use]
    pub fn new(prune: bool, cache_control: Option<String>, distribution_paths: Vec<String>) -> Self {
        Self {
            prune,
            cache_control,
            distribution_paths,
        }
    }

    /// Read the settings from a synthesized deployment resource.
    ///
    /// # Errors
    ///
    /// Fails on other resource types or when `Prune` is not a boolean.
    pub fn from_declaration(decl: &ResourceDecl) -> DeployResult<Self> {
        if decl.resource_type() != BUCKET_DEPLOYMENT_RESOURCE_TYPE {
            return Err(DeployError::UnexpectedResourceType {
                expected: BUCKET_DEPLOYMENT_RESOURCE_TYPE.to_owned(),
                found: decl.resource_type().to_owned(),
            });
        }
        let missing = |property: &str| DeployError::MissingProperty {
            resource: BUCKET_DEPLOYMENT_RESOURCE_TYPE.to_owned(),
            property: property.to_owned(),
        };

        let prune = decl
            .get("Prune")
            .and_then(Value::as_bool)
            .ok_or_else(|| missing("Prune"))?;
        let cache_control = decl
            .get("SystemMetadata")
            .and_then(|m| m.get("cache-control"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        let distribution_paths = match decl.get("DistributionPaths") {
            None => Vec::new(),
            Some(paths) => paths
                .as_list()
                .ok_or_else(|| missing("DistributionPaths"))?
                .iter()
                .map(|p| p.as_str().map(str::to_owned).ok_or_else(|| missing("DistributionPaths")))
                .collect::<DeployResult<_>>()?,
        };

        Ok(Self::new(prune, cache_control, distribution_paths))
    }

    /// Whether stale keys are deleted.
    #[must_use]
    pub fn prune(&self) -> bool {
        self.prune
    }

    /// `Cache-Control` applied to copied objects.
    #[must_use]
    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    /// Paths invalidated after copying.
    #[must_use]
    pub fn distribution_paths(&self) -> &[String] {
        &self.distribution_paths
    }

    /// Unpack a staged zip artifact.
    ///
    /// # Errors
    ///
    /// Fails if the archive cannot be read or holds an entry whose name is
    /// absolute or escapes the archive root.
    pub fn read_artifact(path: &Path) -> DeployResult<Artifact> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entries = Artifact::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let key = object_key(entry.name())?;
            let mut body = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
            entry.read_to_end(&mut body)?;
            entries.insert(key, Bytes::from(body));
        }
        Ok(entries)
    }

    /// Unpack `path` off the async runtime and apply it.
    ///
    /// # Errors
    ///
    /// See [`Self::read_artifact`] and [`Self::apply`].
    pub async fn apply_archive(
        &self,
        path: &Path,
        bucket: &SimulatedBucket,
        distribution: Option<&SimulatedDistribution>,
    ) -> DeployResult<DeploymentReport> {
        let path = path.to_path_buf();
        let artifact = tokio::task::spawn_blocking(move || Self::read_artifact(&path))
            .await
            .map_err(std::io::Error::other)??;
        self.apply(&artifact, bucket, distribution)
    }

    /// Copy `artifact` into `bucket`, prune, and invalidate.
    ///
    /// # Errors
    ///
    /// Fails when the distribution rejects the invalidation.
    pub fn apply(
        &self,
        artifact: &Artifact,
        bucket: &SimulatedBucket,
        distribution: Option<&SimulatedDistribution>,
    ) -> DeployResult<DeploymentReport> {
        let mut report = DeploymentReport::default();

        for (key, body) in artifact {
            let up_to_date = bucket.head_object(key).is_some_and(|current| {
                current.etag == compute_etag(body)
                    && current.cache_control.as_deref() == self.cache_control()
            });
            if up_to_date {
                report.unchanged.push(key.clone());
            } else {
                bucket.put_object(key, body.clone(), self.cache_control());
                report.uploaded.push(key.clone());
            }
        }

        if self.prune {
            for key in bucket.keys() {
                if !artifact.contains_key(&key) && bucket.delete_object(&key) {
                    report.pruned.push(key);
                }
            }
        }

        if let Some(distribution) = distribution
            && !self.distribution_paths.is_empty()
        {
            let caller_reference = self.caller_reference(artifact, bucket);
            let (invalidation, created) =
                distribution.create_invalidation(&caller_reference, &self.distribution_paths)?;
            report.invalidation = Some(invalidation);
            report.invalidation_created = created;
        }

        info!(
            bucket = %bucket.name(),
            uploaded = report.uploaded.len(),
            unchanged = report.unchanged.len(),
            pruned = report.pruned.len(),
            invalidated = report.invalidation_created,
            "applied bucket deployment"
        );
        Ok(report)
    }

    /// Digest of the deployed content, the settings that shape it, and the
    /// bucket revision it produced. A run that changed nothing leaves the
    /// revision alone and so reuses the previous invalidation, while
    /// redeploying older content always gets a fresh one.
    fn caller_reference(&self, artifact: &Artifact, bucket: &SimulatedBucket) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bucket.name().as_bytes());
        hasher.update([0u8]);
        hasher.update(bucket.revision().to_be_bytes());
        for (key, body) in artifact {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(compute_etag(body).as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(self.cache_control().unwrap_or_default().as_bytes());
        hasher.update([0u8]);
        hasher.update([u8::from(self.prune)]);
        let digest = hex::encode(hasher.finalize());
        format!("apistack-{}", &digest[..32])
    }
}

/// Validate an archive entry name as a bucket key.
fn object_key(name: &str) -> DeployResult<String> {
    let normal = Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if name.is_empty() || !normal {
        return Err(DeployError::InvalidKey(name.to_owned()));
    }
    Ok(name.to_owned())
}
