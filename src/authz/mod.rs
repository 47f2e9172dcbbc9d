//! Authorization decision engine.
//!
//! Resource-scoped checks for projects, tasks and comments:
//! - blank principals are denied
//! - Admin is allowed everything
//! - otherwise a per-resource policy decides from the caller's roles and
//!   ownership facts of the resource
//!
//! The engine never touches storage. Handlers load the resource, build the
//! facts, ask, and only then mutate.

mod evaluator;
pub mod guards;
mod operation;
mod policy;
mod principal;
mod resource;

pub use evaluator::{authorize, authorize_named, Decision, Denial};
pub use guards::GuardViolation;
pub use operation::{CommentOperation, ProjectOperation, TaskOperation};
pub use policy::{CommentPolicy, Policy, ProjectPolicy, TaskPolicy};
pub use principal::{Principal, Role, UnknownRole};
pub use resource::{AccessRequest, CommentFacts, ProjectFacts, ResourceRef, TaskFacts, TaskTarget};

use crate::errors::AppError;

impl From<Denial> for AppError {
    fn from(value: Denial) -> Self {
        AppError::forbidden(value.message().to_string())
    }
}

/// Evaluates `request` and converts a denial into a 403 error.
pub fn require(principal: &Principal, request: AccessRequest<'_>) -> Result<(), AppError> {
    authorize(principal, request).into_result().map_err(AppError::from)
}

/// Global role gate for endpoints that are not resource-scoped.
pub fn require_any_role(principal: &Principal, roles: &[Role]) -> Result<(), AppError> {
    if principal.is_authenticated() && principal.has_any_role(roles) {
        return Ok(());
    }
    tracing::debug!(user_id = %principal.user_id, ?roles, "role gate denied");
    Err(AppError::forbidden("insufficient role for this operation"))
}
