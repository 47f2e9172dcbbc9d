//! State preconditions checked alongside authorization.
//!
//! These are not permission questions: they hold for every caller, Admin
//! included, and surface as 400 rather than 403.

use crate::errors::AppError;
use crate::models::TaskStatus;

use super::resource::ProjectFacts;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardViolation {
    #[error("cannot delete a task that is in progress")]
    TaskInProgress,
    #[error("cannot delete a project with {0} unfinished task(s)")]
    ProjectHasUnfinishedTasks(usize),
    #[error("the project creator cannot be removed from the project")]
    CreatorNotRemovable,
    #[error("member still holds {0} unfinished task(s) in this project")]
    MemberHasUnfinishedTasks(usize),
}

impl From<GuardViolation> for AppError {
    fn from(value: GuardViolation) -> Self {
        AppError::bad_request(value.to_string())
    }
}

pub fn ensure_task_deletable(status: TaskStatus) -> Result<(), GuardViolation> {
    if status.is_active_work() {
        return Err(GuardViolation::TaskInProgress);
    }
    Ok(())
}

/// `statuses` are the statuses of every task in the project.
pub fn ensure_project_deletable(statuses: impl IntoIterator<Item = TaskStatus>) -> Result<(), GuardViolation> {
    match unfinished(statuses) {
        0 => Ok(()),
        n => Err(GuardViolation::ProjectHasUnfinishedTasks(n)),
    }
}

/// `held` are the statuses of the tasks in this project assigned to `user_id`.
pub fn ensure_member_removable(
    project: &ProjectFacts,
    user_id: &str,
    held: impl IntoIterator<Item = TaskStatus>,
) -> Result<(), GuardViolation> {
    if project.is_creator(user_id) {
        return Err(GuardViolation::CreatorNotRemovable);
    }
    match unfinished(held) {
        0 => Ok(()),
        n => Err(GuardViolation::MemberHasUnfinishedTasks(n)),
    }
}

fn unfinished(statuses: impl IntoIterator<Item = TaskStatus>) -> usize {
    statuses.into_iter().filter(|status| !status.is_terminal()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_task_is_never_deletable() {
        assert_eq!(ensure_task_deletable(TaskStatus::InProgress), Err(GuardViolation::TaskInProgress));
        assert!(ensure_task_deletable(TaskStatus::Open).is_ok());
        assert!(ensure_task_deletable(TaskStatus::Done).is_ok());
    }

    #[test]
    fn project_with_open_work_is_not_deletable() {
        let statuses = [TaskStatus::Done, TaskStatus::ToDo, TaskStatus::Open];
        assert_eq!(
            ensure_project_deletable(statuses),
            Err(GuardViolation::ProjectHasUnfinishedTasks(2))
        );
        assert!(ensure_project_deletable([TaskStatus::Done, TaskStatus::Done]).is_ok());
        assert!(ensure_project_deletable([]).is_ok());
    }

    #[test]
    fn creator_is_never_removable() {
        let project = ProjectFacts::new("m1").with_members(["m1", "u1"]);
        assert_eq!(
            ensure_member_removable(&project, "m1", []),
            Err(GuardViolation::CreatorNotRemovable)
        );
    }

    #[test]
    fn member_with_unfinished_assignment_is_kept() {
        let project = ProjectFacts::new("m1").with_members(["u1"]);
        assert_eq!(
            ensure_member_removable(&project, "u1", [TaskStatus::InProgress, TaskStatus::Done]),
            Err(GuardViolation::MemberHasUnfinishedTasks(1))
        );
        assert!(ensure_member_removable(&project, "u1", [TaskStatus::Done]).is_ok());
    }

    #[test]
    fn violations_map_to_bad_request() {
        let err: AppError = GuardViolation::TaskInProgress.into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
