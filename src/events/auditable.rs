use serde::{Deserialize, Serialize};

/// Severity levels for audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Destructive or privilege-changing actions.
    Critical,
    #[default]
    Important,
    /// Bookkeeping such as tag additions.
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    Assigned,
    StatusChanged,
    TagsAdded,
    MemberAdded,
    MemberRemoved,
    RoleChanged,
    Registered,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Deleted => "deleted",
            AuditAction::Assigned => "assigned",
            AuditAction::StatusChanged => "status_changed",
            AuditAction::TagsAdded => "tags_added",
            AuditAction::MemberAdded => "member_added",
            AuditAction::MemberRemoved => "member_removed",
            AuditAction::RoleChanged => "role_changed",
            AuditAction::Registered => "registered",
        }
    }
}

/// Entities that can appear in the audit trail.
pub trait Auditable: Serialize + Send + Sync {
    /// Prefix of the event name, e.g. "task" in "task.updated".
    fn entity_name() -> &'static str;

    fn entity_id(&self) -> String;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: AuditAction) -> Severity {
        match action {
            AuditAction::Deleted | AuditAction::RoleChanged | AuditAction::MemberRemoved => Severity::Critical,
            AuditAction::Created | AuditAction::Updated => self.severity(),
            AuditAction::TagsAdded => Severity::Noise,
            _ => Severity::Important,
        }
    }
}
