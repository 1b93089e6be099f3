//! CloudFormation template model for ApiStack.
//!
//! The stack descriptor declares resources as [`ResourceDecl`] values whose
//! properties are [`Value`] trees. Intrinsic functions (`Ref`,
//! `Fn::GetAtt`, `Fn::Join`, `Fn::Sub`, `Fn::Transform`) are first-class
//! variants so that references between resources can be discovered before
//! the template is written out.
//!
//! ```text
//! Value (intrinsics)  ──▶  ResourceDecl  ──▶  Template  ──▶  JSON
//!                                             Output  ──┘
//! ```

mod intrinsic;
mod resource;
mod template;

pub use intrinsic::{Pseudo, Value};
pub use resource::{DeletionPolicy, ResourceDecl};
pub use template::{Export, Output, TEMPLATE_FORMAT_VERSION, Template};
