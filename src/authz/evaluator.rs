use std::fmt;

use super::policy::{CommentPolicy, Policy, ProjectPolicy, TaskPolicy};
use super::principal::Principal;
use super::resource::{AccessRequest, ResourceRef};

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// `Ok(())` on Allow, the denial otherwise. Handlers use this with `?`.
    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(denial),
        }
    }
}

/// Why a request was refused. The message is for humans and logs only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Denial {
    message: String,
}

impl Denial {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Role and ownership based decision.
///
/// Evaluation order:
/// 1. blank user id -> deny
/// 2. admin role -> allow
/// 3. per-resource policy, union over the principal's roles
pub fn authorize(principal: &Principal, request: AccessRequest<'_>) -> Decision {
    let operation = request.operation_name();
    let resource = request.resource_kind();

    if !principal.is_authenticated() {
        tracing::debug!(operation, resource, "unauthenticated principal denied");
        return Decision::Deny(Denial::new("authentication required"));
    }

    if principal.is_admin() {
        tracing::debug!(user_id = %principal.user_id, operation, resource, "admin bypass");
        return Decision::Allow;
    }

    let allowed = match request {
        AccessRequest::Project(op, project) => ProjectPolicy::permits(principal, op, project),
        AccessRequest::Task(op, target) => TaskPolicy::permits(principal, op, target),
        AccessRequest::Comment(op, comment) => CommentPolicy::permits(principal, op, comment),
    };

    if allowed {
        tracing::debug!(user_id = %principal.user_id, operation, resource, "permission granted");
        Decision::Allow
    } else {
        tracing::debug!(user_id = %principal.user_id, operation, resource, "permission denied");
        Decision::Deny(Denial::new(format!("not allowed to {} this {}", operation.to_lowercase(), resource)))
    }
}

/// String-keyed entry point. An operation name that does not exist for the
/// resource's kind is denied.
pub fn authorize_named(principal: &Principal, operation: &str, resource: ResourceRef<'_>) -> Decision {
    match resource.request(operation) {
        Some(request) => authorize(principal, request),
        None => {
            tracing::debug!(user_id = %principal.user_id, operation, "unknown operation denied");
            Decision::Deny(Denial::new(format!("unknown operation: {operation}")))
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Deny(denial) => write!(f, "deny: {denial}"),
        }
    }
}
