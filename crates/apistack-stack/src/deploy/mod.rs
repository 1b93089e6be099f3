//! Deployment simulation.
//!
//! In-memory stand-ins for the bucket, the distribution, and the bucket
//! deployment custom resource, so that the apply-time behavior of a
//! synthesized stack (content copy, pruning, cache headers, invalidation,
//! and teardown) can be exercised without an account.

pub mod action;
pub mod bucket;
pub mod distribution;
pub mod error;

pub use action::{Artifact, BucketDeploymentAction, DeploymentReport};
pub use bucket::{SimulatedBucket, StoredObject, TeardownOutcome, compute_etag};
pub use distribution::{Invalidation, SimulatedDistribution};
pub use error::{DeployError, DeployResult};
