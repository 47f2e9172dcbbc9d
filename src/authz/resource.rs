use std::collections::BTreeSet;

use super::operation::{CommentOperation, ProjectOperation, TaskOperation};

/// The slice of a project the policies look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFacts {
    pub creator_id: String,
    pub member_ids: BTreeSet<String>,
}

impl ProjectFacts {
    pub fn new(creator_id: impl Into<String>) -> Self {
        Self {
            creator_id: creator_id.into(),
            member_ids: BTreeSet::new(),
        }
    }

    pub fn with_members<S: Into<String>>(mut self, members: impl IntoIterator<Item = S>) -> Self {
        self.member_ids.extend(members.into_iter().map(Into::into));
        self
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        !user_id.is_empty() && self.creator_id == user_id
    }

    /// The creator counts as a member even if the membership row is missing.
    pub fn is_member(&self, user_id: &str) -> bool {
        self.is_creator(user_id) || self.member_ids.contains(user_id)
    }
}

/// The slice of a task the policies look at. `project_creator_id` is
/// `None` when the owning project could not be resolved, which denies every
/// ownership-based rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFacts {
    pub assigned_user_id: Option<String>,
    pub project_creator_id: Option<String>,
}

impl TaskFacts {
    pub fn new(project_creator_id: impl Into<String>) -> Self {
        Self {
            assigned_user_id: None,
            project_creator_id: Some(project_creator_id.into()),
        }
    }

    pub fn assigned_to(mut self, user_id: impl Into<String>) -> Self {
        self.assigned_user_id = Some(user_id.into());
        self
    }

    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        !user_id.is_empty() && self.assigned_user_id.as_deref() == Some(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentFacts {
    pub author_id: String,
}

impl CommentFacts {
    pub fn new(author_id: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
        }
    }
}

/// What a task operation is evaluated against: an existing task, or, for
/// creation, the project the new task would land in.
#[derive(Debug, Clone, Copy)]
pub enum TaskTarget<'a> {
    Existing(&'a TaskFacts),
    NewIn(&'a ProjectFacts),
}

impl<'a> TaskTarget<'a> {
    pub fn project_creator_id(&self) -> Option<&'a str> {
        match self {
            TaskTarget::Existing(task) => task.project_creator_id.as_deref(),
            TaskTarget::NewIn(project) => Some(project.creator_id.as_str()),
        }
    }

    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        match self {
            TaskTarget::Existing(task) => task.is_assigned_to(user_id),
            TaskTarget::NewIn(_) => false,
        }
    }
}

/// A fully-typed authorization question.
#[derive(Debug, Clone, Copy)]
pub enum AccessRequest<'a> {
    Project(ProjectOperation, &'a ProjectFacts),
    Task(TaskOperation, TaskTarget<'a>),
    Comment(CommentOperation, &'a CommentFacts),
}

impl<'a> AccessRequest<'a> {
    pub fn project(op: ProjectOperation, project: &'a ProjectFacts) -> Self {
        Self::Project(op, project)
    }

    pub fn task(op: TaskOperation, task: &'a TaskFacts) -> Self {
        Self::Task(op, TaskTarget::Existing(task))
    }

    pub fn create_task_in(project: &'a ProjectFacts) -> Self {
        Self::Task(TaskOperation::Create, TaskTarget::NewIn(project))
    }

    pub fn comment(op: CommentOperation, comment: &'a CommentFacts) -> Self {
        Self::Comment(op, comment)
    }

    pub fn operation_name(&self) -> &'static str {
        match self {
            AccessRequest::Project(op, _) => op.as_str(),
            AccessRequest::Task(op, _) => op.as_str(),
            AccessRequest::Comment(op, _) => op.as_str(),
        }
    }

    pub fn resource_kind(&self) -> &'static str {
        match self {
            AccessRequest::Project(..) => "project",
            AccessRequest::Task(..) => "task",
            AccessRequest::Comment(..) => "comment",
        }
    }
}

/// A resource without an operation attached, for name-based lookups.
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    Project(&'a ProjectFacts),
    Task(TaskTarget<'a>),
    Comment(&'a CommentFacts),
}

impl<'a> ResourceRef<'a> {
    /// Pairs the resource with the named operation of its own kind.
    pub fn request(self, operation: &str) -> Option<AccessRequest<'a>> {
        match self {
            ResourceRef::Project(project) => {
                ProjectOperation::parse(operation).map(|op| AccessRequest::Project(op, project))
            }
            ResourceRef::Task(target) => {
                TaskOperation::parse(operation).map(|op| AccessRequest::Task(op, target))
            }
            ResourceRef::Comment(comment) => {
                CommentOperation::parse(operation).map(|op| AccessRequest::Comment(op, comment))
            }
        }
    }
}
