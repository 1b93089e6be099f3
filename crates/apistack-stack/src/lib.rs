//! ApiStack deployment descriptor.
//!
//! The stack is a function of [`apistack_core::StackConfig`]: [`synth`]
//! resolves the documentation image, then [`synthesize`] declares every
//! resource in dependency order through a [`StackBuilder`] and returns the
//! CloudFormation template together with the asset manifest.
//!
//! ```text
//! StackConfig ──▶ synth ──▶ StackBuilder ──▶ DeclaredStack ──▶ template.json
//!                                 │                      └───▶ assets.json
//!                                 └── constructs (typed handles)
//! ```
//!
//! The [`deploy`] module simulates the apply-time behavior of the
//! documentation deployment against in-memory stores.

pub mod api_stack;
mod builder;
mod checkpoint;
pub mod constructs;
pub mod deploy;
mod error;

pub use api_stack::{Synthesized, resolve_doc_image, synth, synthesize};
pub use builder::{Construct, DeclaredStack, Handle, StackBuilder};
pub use checkpoint::Checkpoint;
pub use error::{StackError, StackResult};
