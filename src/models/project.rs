use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::authz::ProjectFacts;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[schema(format = DateTime, example = "2025-10-01T09:00:00Z")]
    pub start_date: Option<DateTime<Utc>>,
    #[schema(format = DateTime, example = "2025-12-15T17:00:00Z")]
    pub end_date: Option<DateTime<Utc>>,
    pub status: String,
    pub creator_id: String,
    pub creator_name: Option<String>,
    pub members: Vec<ProjectMember>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Auditable for Project {
    fn entity_name() -> &'static str {
        "project"
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: String,
    pub creator_id: String,
    pub creator_first_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbProject {
    pub fn into_project(self, members: Vec<ProjectMember>) -> Project {
        Project {
            id: self.id,
            name: self.name,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            creator_id: self.creator_id,
            creator_name: self.creator_first_name,
            members,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Project {
    pub fn facts(&self) -> ProjectFacts {
        ProjectFacts::new(self.creator_id.clone()).with_members(self.members.iter().map(|m| m.user_id.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ProjectMember {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Launch Planning")]
    pub name: String,
    #[schema(example = "Prepare milestones for the product launch.")]
    pub description: Option<String>,
    #[schema(format = DateTime, example = "2025-10-01T09:00:00Z")]
    pub start_date: Option<DateTime<Utc>>,
    #[schema(format = DateTime, example = "2025-12-15T17:00:00Z")]
    pub end_date: Option<DateTime<Utc>>,
    #[schema(example = "Active")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(format = DateTime)]
    pub start_date: Option<DateTime<Utc>>,
    #[schema(format = DateTime)]
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: String,
}
