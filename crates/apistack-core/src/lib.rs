//! Core types, configuration, and dependency graph for ApiStack.
//!
//! This crate provides the foundational building blocks shared by the
//! template model, the bundling pipeline, and the stack descriptor:
//! identifiers with validation rules, the stack configuration, and the
//! [`DependencyGraph`] that orders declared nodes before synthesis.

mod config;
mod error;
pub mod graph;
mod types;
pub mod validation;

pub use config::{StackConfig, parse_bool};
pub use error::{CoreError, CoreResult};
pub use graph::{DependencyGraph, GraphNode, NodeKind};
pub use types::{AccountId, AwsRegion, BucketEncryption, LogicalId, StageName};
