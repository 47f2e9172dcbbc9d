//! Per-resource operation sets.
//!
//! Each resource kind has its own closed enum so a policy can only ever be
//! asked about an operation that exists for it. Names coming from outside
//! (logs, admin tooling) go through `parse`, which returns `None` for
//! anything unrecognised; callers turn that into a denial.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectOperation {
    View,
    Update,
    Delete,
    ManageMembers,
}

impl ProjectOperation {
    pub fn parse(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "view" => Some(Self::View),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "managemembers" => Some(Self::ManageMembers),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "View",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::ManageMembers => "ManageMembers",
        }
    }
}

/// `Update` covers editing, reassignment, tag changes and status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOperation {
    View,
    Update,
    Delete,
    Create,
}

impl TaskOperation {
    pub fn parse(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "view" => Some(Self::View),
            "update" | "modify" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "create" => Some(Self::Create),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "View",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Create => "Create",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentOperation {
    Edit,
    Delete,
}

impl CommentOperation {
    pub fn parse(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "edit" => Some(Self::Edit),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "Edit",
            Self::Delete => "Delete",
        }
    }
}

macro_rules! display_via_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_via_as_str!(ProjectOperation, TaskOperation, CommentOperation);

// "ManageMembers", "manage_members" and "manage-members" are the same name.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modify_is_an_alias_for_task_update() {
        assert_eq!(TaskOperation::parse("Modify"), Some(TaskOperation::Update));
        assert_eq!(TaskOperation::parse("update"), Some(TaskOperation::Update));
    }

    #[test]
    fn separators_are_ignored() {
        assert_eq!(
            ProjectOperation::parse("manage_members"),
            Some(ProjectOperation::ManageMembers)
        );
        assert_eq!(
            ProjectOperation::parse("ManageMembers"),
            Some(ProjectOperation::ManageMembers)
        );
    }

    #[test]
    fn operations_do_not_leak_across_kinds() {
        assert_eq!(CommentOperation::parse("View"), None);
        assert_eq!(ProjectOperation::parse("Edit"), None);
        assert_eq!(ProjectOperation::parse("Create"), None);
        assert_eq!(TaskOperation::parse("ManageMembers"), None);
        assert_eq!(TaskOperation::parse(""), None);
    }
}
