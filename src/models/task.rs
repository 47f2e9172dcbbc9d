use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::authz::TaskFacts;
use crate::errors::AppError;
use crate::models::status::TaskStatus;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub project_name: String,
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "High")]
    pub priority: Option<String>,
    #[schema(format = DateTime, example = "2025-10-10T10:00:00Z")]
    pub due_date: Option<DateTime<Utc>>,
    #[schema(value_type = String, example = "In Progress")]
    pub status: TaskStatus,
    pub creator_id: String,
    pub assigned_user_id: Option<String>,
    pub assigned_user_name: Option<String>,
    pub tag_ids: Vec<i64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Auditable for Task {
    fn entity_name() -> &'static str {
        "task"
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

/// A task row joined with its project and assignee.
#[derive(Debug, Clone, FromRow)]
pub struct DbTask {
    pub id: i64,
    pub project_id: i64,
    pub project_name: String,
    pub project_creator_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: String,
    pub creator_id: String,
    pub assigned_user_id: Option<String>,
    pub assignee_first_name: Option<String>,
    pub assignee_last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbTask {
    /// Stored labels are always written through `TaskStatus`, so a parse
    /// failure here means the row was edited outside the service.
    pub fn status(&self) -> Result<TaskStatus, AppError> {
        self.status
            .parse()
            .map_err(|_| AppError::internal(format!("task {} has unknown stored status {:?}", self.id, self.status)))
    }

    pub fn facts(&self) -> TaskFacts {
        TaskFacts {
            assigned_user_id: self.assigned_user_id.clone(),
            project_creator_id: self.project_creator_id.clone(),
        }
    }

    pub fn into_task(self, tags: Vec<(i64, String)>) -> Result<Task, AppError> {
        let status = self.status()?;
        let assigned_user_name = match (&self.assignee_first_name, &self.assignee_last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            _ => None,
        };
        let (tag_ids, tags) = tags.into_iter().unzip();

        Ok(Task {
            id: self.id,
            project_id: self.project_id,
            project_name: self.project_name,
            title: self.title,
            description: self.description,
            priority: self.priority,
            due_date: self.due_date,
            status,
            creator_id: self.creator_id,
            assigned_user_id: self.assigned_user_id,
            assigned_user_name,
            tag_ids,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = "Define launch checklist")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "Medium")]
    pub priority: Option<String>,
    #[schema(format = DateTime, example = "2025-10-10T10:00:00Z")]
    pub due_date: Option<DateTime<Utc>>,
    #[schema(example = "Open")]
    pub status: Option<String>,
    pub assigned_user_id: Option<String>,
    pub tag_ids: Option<Vec<i64>>,
}

/// Fields left out are kept. `tag_ids`, when present, replaces the tag set.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    #[schema(format = DateTime)]
    pub due_date: Option<DateTime<Utc>>,
    #[schema(example = "In Progress")]
    pub status: Option<String>,
    pub tag_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTaskRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskStatusRequest {
    #[schema(example = "Done")]
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskTagsRequest {
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TaskListQuery {
    /// Restrict the listing to one project.
    pub project_id: Option<i64>,
}
