//! In-memory distribution that records cache invalidations.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{DeployError, DeployResult};

/// A recorded invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    /// Invalidation id.
    pub id: String,
    /// Idempotency token supplied by the caller.
    pub caller_reference: String,
    /// Invalidated paths.
    pub paths: Vec<String>,
    /// Creation time.
    pub create_time: DateTime<Utc>,
}

/// An in-memory web distribution.
#[derive(Debug)]
pub struct SimulatedDistribution {
    id: String,
    domain_name: String,
    /// Invalidations keyed by caller reference.
    invalidations: DashMap<String, Invalidation>,
}

impl Default for SimulatedDistribution {
    fn default() -> Self {
        Self::new()
    }
}

fn short_id(prefix: char) -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{prefix}{}", &raw[..13])
}

impl SimulatedDistribution {
    /// A distribution with a generated id and domain name.
    #[must_use]
    pub fn new() -> Self {
        let id = short_id('E');
        let domain_name = format!("d{}.cloudfront.net", id[1..].to_lowercase());
        Self {
            id,
            domain_name,
            invalidations: DashMap::new(),
        }
    }

    /// Distribution id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `*.cloudfront.net` domain name.
    #[must_use]
    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// Create an invalidation, or return the existing one for the same
    /// caller reference. The flag reports whether a new one was created.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidationConflict`] when the caller
    /// reference was already used for different paths.
    pub fn create_invalidation(
        &self,
        caller_reference: &str,
        paths: &[String],
    ) -> DeployResult<(Invalidation, bool)> {
        match self.invalidations.entry(caller_reference.to_owned()) {
            Entry::Occupied(existing) => {
                if existing.get().paths != paths {
                    return Err(DeployError::InvalidationConflict {
                        caller_reference: caller_reference.to_owned(),
                    });
                }
                debug!(
                    distribution = %self.id,
                    caller_reference,
                    "reusing existing invalidation"
                );
                Ok((existing.get().clone(), false))
            }
            Entry::Vacant(slot) => {
                let invalidation = Invalidation {
                    id: short_id('I'),
                    caller_reference: caller_reference.to_owned(),
                    paths: paths.to_vec(),
                    create_time: Utc::now(),
                };
                info!(
                    distribution = %self.id,
                    invalidation = %invalidation.id,
                    paths = ?invalidation.paths,
                    "created invalidation"
                );
                slot.insert(invalidation.clone());
                Ok((invalidation, true))
            }
        }
    }

    /// Look up an invalidation by caller reference.
    #[must_use]
    pub fn invalidation(&self, caller_reference: &str) -> Option<Invalidation> {
        self.invalidations
            .get(caller_reference)
            .map(|entry| entry.value().clone())
    }

    /// Number of invalidations created so far.
    #[must_use]
    pub fn invalidation_count(&self) -> usize {
        self.invalidations.len()
    }
}
