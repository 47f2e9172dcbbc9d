use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityLogEntry {
    pub id: i64,
    #[schema(example = "task")]
    pub entity_name: String,
    pub entity_id: String,
    #[schema(example = "updated")]
    pub action: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub old_values: Option<Value>,
    #[schema(value_type = Object)]
    pub new_values: Option<Value>,
    pub severity: String,
    pub correlation_id: Option<String>,
    pub hash: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActivityLog {
    pub id: i64,
    pub entity_name: String,
    pub entity_id: String,
    pub action: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub severity: String,
    pub correlation_id: Option<String>,
    pub hash: String,
}

impl From<DbActivityLog> for ActivityLogEntry {
    fn from(value: DbActivityLog) -> Self {
        // Snapshots are written by the listener as JSON; anything else is shown raw.
        let parse = |raw: Option<String>| raw.map(|s| serde_json::from_str(&s).unwrap_or(Value::String(s)));

        ActivityLogEntry {
            id: value.id,
            entity_name: value.entity_name,
            entity_id: value.entity_id,
            action: value.action,
            user_id: value.user_id,
            user_name: value.user_name,
            occurred_at: value.occurred_at,
            old_values: parse(value.old_values),
            new_values: parse(value.new_values),
            severity: value.severity,
            correlation_id: value.correlation_id,
            hash: value.hash,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    #[param(minimum = 1, example = 1)]
    pub page: Option<i64>,
    #[param(minimum = 1, maximum = 100, example = 20)]
    pub page_size: Option<i64>,
}

impl AuditQuery {
    pub const DEFAULT_PAGE_SIZE: i64 = 20;
    pub const MAX_PAGE_SIZE: i64 = 100;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditPage {
    pub items: Vec<ActivityLogEntry>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_is_clamped() {
        let query = AuditQuery {
            page: Some(0),
            page_size: Some(1_000),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.page_size(), AuditQuery::MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let query = AuditQuery {
            page: Some(3),
            page_size: None,
        };
        assert_eq!(query.offset(), 40);
    }

    #[test]
    fn huge_page_numbers_saturate() {
        let query = AuditQuery {
            page: Some(i64::MAX),
            page_size: Some(100),
        };
        assert_eq!(query.offset(), i64::MAX);
    }
}
