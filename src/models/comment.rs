use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::authz::CommentFacts;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Comment {
    pub id: i64,
    pub task_id: i64,
    pub content: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn facts(&self) -> CommentFacts {
        CommentFacts::new(self.author_id.clone())
    }
}

impl crate::events::Auditable for Comment {
    fn entity_name() -> &'static str {
        "comment"
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentRequest {
    #[schema(example = "Blocked on the vendor quote.")]
    pub content: String,
}
