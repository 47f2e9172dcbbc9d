use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Tag {
    pub id: i64,
    #[schema(example = "backend")]
    pub name: String,
}

impl crate::events::Auditable for Tag {
    fn entity_name() -> &'static str {
        "tag"
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TagCreateRequest {
    pub name: String,
}
