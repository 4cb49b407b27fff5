//! Ticket-level access decisions
//!
//! - [`AccessDecisionEngine`]: ticket-type gating with a recursion guard
//! - [`EvaluationSession`]: per-request guard set and blocked counter
//! - [`PermissionPipeline`]: engine + grant store as a principal context

mod engine;
mod pipeline;
mod session;

pub use engine::{AccessDecisionEngine, Decision};
pub use pipeline::PermissionPipeline;
pub use session::EvaluationSession;
