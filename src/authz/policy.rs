use super::operation::{CommentOperation, ProjectOperation, TaskOperation};
use super::principal::{Principal, Role};
use super::resource::{CommentFacts, ProjectFacts, TaskTarget};

/// Per-resource rule table.
///
/// A policy answers for a single role at a time; a principal holding
/// several roles is allowed when any one of them is.
pub trait Policy<'r> {
    type Operation: Copy;
    type Resource: Copy;

    fn role_permits(role: Role, user_id: &str, op: Self::Operation, resource: Self::Resource) -> bool;

    fn permits(principal: &Principal, op: Self::Operation, resource: Self::Resource) -> bool {
        principal
            .roles
            .iter()
            .any(|role| Self::role_permits(*role, &principal.user_id, op, resource))
    }
}

pub struct ProjectPolicy;

impl<'r> Policy<'r> for ProjectPolicy {
    type Operation = ProjectOperation;
    type Resource = &'r ProjectFacts;

    fn role_permits(role: Role, user_id: &str, op: ProjectOperation, project: &'r ProjectFacts) -> bool {
        match (role, op) {
            (Role::Admin, _) => true,
            (Role::Manager, ProjectOperation::View) => true,
            (Role::Manager, ProjectOperation::Update | ProjectOperation::Delete | ProjectOperation::ManageMembers) => {
                project.is_creator(user_id)
            }
            (Role::Member, ProjectOperation::View) => project.is_member(user_id),
            (Role::Member, _) => false,
        }
    }
}

pub struct TaskPolicy;

impl<'r> Policy<'r> for TaskPolicy {
    type Operation = TaskOperation;
    type Resource = TaskTarget<'r>;

    fn role_permits(role: Role, user_id: &str, op: TaskOperation, target: TaskTarget<'r>) -> bool {
        let owns_project = || !user_id.is_empty() && target.project_creator_id() == Some(user_id);

        match (role, op) {
            (Role::Admin, _) => true,
            (Role::Manager, TaskOperation::View) => true,
            (Role::Manager, TaskOperation::Update | TaskOperation::Delete | TaskOperation::Create) => owns_project(),
            (Role::Member, TaskOperation::View | TaskOperation::Update) => target.is_assigned_to(user_id),
            (Role::Member, TaskOperation::Delete | TaskOperation::Create) => false,
        }
    }
}

pub struct CommentPolicy;

impl<'r> Policy<'r> for CommentPolicy {
    type Operation = CommentOperation;
    type Resource = &'r CommentFacts;

    fn role_permits(role: Role, user_id: &str, _op: CommentOperation, comment: &'r CommentFacts) -> bool {
        match role {
            Role::Admin => true,
            Role::Manager | Role::Member => !user_id.is_empty() && comment.author_id == user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::resource::TaskFacts;

    fn manager(id: &str) -> Principal {
        Principal::new(id).with_role(Role::Manager)
    }

    fn member(id: &str) -> Principal {
        Principal::new(id).with_role(Role::Member)
    }

    #[test]
    fn manager_view_does_not_depend_on_membership() {
        let project = ProjectFacts::new("someone-else");
        assert!(ProjectPolicy::permits(&manager("m1"), ProjectOperation::View, &project));
    }

    #[test]
    fn creator_counts_as_member_for_view() {
        let project = ProjectFacts::new("u1");
        assert!(ProjectPolicy::permits(&member("u1"), ProjectOperation::View, &project));
        assert!(!ProjectPolicy::permits(&member("u2"), ProjectOperation::View, &project));
    }

    #[test]
    fn member_never_manages_even_own_project() {
        let project = ProjectFacts::new("u1").with_members(["u1"]);
        for op in [ProjectOperation::Update, ProjectOperation::Delete, ProjectOperation::ManageMembers] {
            assert!(!ProjectPolicy::permits(&member("u1"), op, &project), "{op}");
        }
    }

    #[test]
    fn roles_union_their_grants() {
        let task = TaskFacts::new("other-manager").assigned_to("u1");
        let both = Principal::new("u1").with_roles([Role::Manager, Role::Member]);
        assert!(TaskPolicy::permits(&both, TaskOperation::Update, TaskTarget::Existing(&task)));
        assert!(!TaskPolicy::permits(&manager("u1"), TaskOperation::Update, TaskTarget::Existing(&task)));
    }

    #[test]
    fn unresolved_project_denies_ownership_rules() {
        let task = TaskFacts {
            assigned_user_id: None,
            project_creator_id: None,
        };
        assert!(!TaskPolicy::permits(&manager("m1"), TaskOperation::Delete, TaskTarget::Existing(&task)));
        assert!(TaskPolicy::permits(&manager("m1"), TaskOperation::View, TaskTarget::Existing(&task)));
    }

    #[test]
    fn principal_without_roles_is_denied_everything() {
        let nobody = Principal::new("u1");
        let project = ProjectFacts::new("u1").with_members(["u1"]);
        assert!(!ProjectPolicy::permits(&nobody, ProjectOperation::View, &project));
        assert!(!CommentPolicy::permits(&nobody, CommentOperation::Edit, &CommentFacts::new("u1")));
    }
}
