//! Field-level policy
//!
//! - [`resolve`] / [`FieldPolicyResolver`]: effective display and edit state
//! - [`MutationValidator`]: rejects changes to fields the user may not edit

mod resolver;
mod validator;

pub use resolver::{resolve, FieldEffectiveState, FieldPolicyResolver};
pub use validator::{FieldViolation, MutationValidator};
