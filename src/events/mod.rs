use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

pub mod auditable;
pub use auditable::{AuditAction, Auditable, Severity};

/// One audited change, as carried on the bus.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub entity_name: &'static str,
    pub entity_id: String,
    pub action: AuditAction,
    pub actor_id: Option<String>,
    pub correlation_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub severity: Severity,
}

impl AuditEvent {
    pub fn name(&self) -> String {
        format!("{}.{}", self.entity_name, self.action.as_str())
    }
}

pub type EventBus = broadcast::Sender<AuditEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<AuditEvent>) {
    broadcast::channel(1024)
}

/// Who caused an event and which request it belongs to.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub actor_id: Option<String>,
    pub correlation_id: Option<String>,
}

/// Publishes a create/update style event: `entity` is the new state,
/// `old` the state before the change.
pub fn record<T: Auditable>(bus: &EventBus, action: AuditAction, ctx: &AuditContext, entity: &T, old: Option<&T>) {
    publish(bus, action, ctx, entity, old.map(snapshot), Some(snapshot(entity)));
}

/// Publishes a deletion: only the last known state is kept.
pub fn record_deleted<T: Auditable>(bus: &EventBus, ctx: &AuditContext, entity: &T) {
    publish(bus, AuditAction::Deleted, ctx, entity, Some(snapshot(entity)), None);
}

fn publish<T: Auditable>(
    bus: &EventBus,
    action: AuditAction,
    ctx: &AuditContext,
    entity: &T,
    old_values: Option<Value>,
    new_values: Option<Value>,
) {
    let event = AuditEvent {
        entity_name: T::entity_name(),
        entity_id: entity.entity_id(),
        action,
        actor_id: ctx.actor_id.clone(),
        correlation_id: ctx.correlation_id.clone(),
        occurred_at: Utc::now(),
        old_values,
        new_values,
        severity: entity.severity_for_action(action),
    };

    // Fire and forget: no listener just means nothing is persisted.
    if bus.send(event).is_err() {
        tracing::warn!(entity = T::entity_name(), action = action.as_str(), "audit event dropped, no listener");
    }
}

fn snapshot<T: Serialize>(entity: &T) -> Value {
    serde_json::to_value(entity).unwrap_or(Value::Null)
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<AuditEvent>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(err) = persist(&pool, &event).await {
                    tracing::error!(event = %event.name(), error = %err, "failed to save activity log");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged, events lost");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("activity listener stopped");
}

/// Columns covered by the chain hash, in the form they are stored.
#[derive(Serialize)]
struct ChainedFields<'a> {
    entity_name: &'a str,
    entity_id: &'a str,
    action: &'a str,
    user_id: Option<&'a str>,
    occurred_at: &'a str,
    old_values: Option<&'a str>,
    new_values: Option<&'a str>,
    severity: &'a str,
}

fn chain_hash(prev_hash: Option<&str>, fields: &ChainedFields<'_>) -> String {
    let payload = serde_json::to_string(fields).unwrap_or_default();
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Appends `event` to `activity_log`, linking it to the previous row's hash.
pub async fn persist(pool: &SqlitePool, event: &AuditEvent) -> Result<(), sqlx::Error> {
    let occurred_at = event.occurred_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    let old_values = event.old_values.as_ref().map(Value::to_string);
    let new_values = event.new_values.as_ref().map(Value::to_string);

    let mut tx = pool.begin().await?;

    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM activity_log ORDER BY id DESC LIMIT 1")
        .fetch_optional(&mut *tx)
        .await?;

    let fields = ChainedFields {
        entity_name: event.entity_name,
        entity_id: &event.entity_id,
        action: event.action.as_str(),
        user_id: event.actor_id.as_deref(),
        occurred_at: &occurred_at,
        old_values: old_values.as_deref(),
        new_values: new_values.as_deref(),
        severity: event.severity.as_str(),
    };
    let hash = chain_hash(prev_hash.as_deref(), &fields);

    sqlx::query(
        r#"
        INSERT INTO activity_log
            (entity_name, entity_id, action, user_id, occurred_at, old_values, new_values, severity, correlation_id, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(fields.entity_name)
    .bind(fields.entity_id)
    .bind(fields.action)
    .bind(fields.user_id)
    .bind(fields.occurred_at)
    .bind(fields.old_values)
    .bind(fields.new_values)
    .bind(fields.severity)
    .bind(event.correlation_id.as_deref())
    .bind(prev_hash.as_deref())
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::debug!(event = %event.name(), entity_id = %event.entity_id, "activity logged");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct StoredLink {
    id: i64,
    entity_name: String,
    entity_id: String,
    action: String,
    user_id: Option<String>,
    occurred_at: String,
    old_values: Option<String>,
    new_values: Option<String>,
    severity: String,
    prev_hash: Option<String>,
    hash: String,
}

/// Walks the audit trail and returns the id of the first row whose hash
/// does not match its content or predecessor, or `None` if intact.
pub async fn verify_chain(pool: &SqlitePool) -> Result<Option<i64>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredLink>(
        "SELECT id, entity_name, entity_id, action, user_id, occurred_at, old_values, new_values, severity, prev_hash, hash FROM activity_log ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut expected_prev: Option<String> = None;
    for row in rows {
        let fields = ChainedFields {
            entity_name: &row.entity_name,
            entity_id: &row.entity_id,
            action: &row.action,
            user_id: row.user_id.as_deref(),
            occurred_at: &row.occurred_at,
            old_values: row.old_values.as_deref(),
            new_values: row.new_values.as_deref(),
            severity: &row.severity,
        };
        let recomputed = chain_hash(expected_prev.as_deref(), &fields);
        if row.prev_hash != expected_prev || row.hash != recomputed {
            return Ok(Some(row.id));
        }
        expected_prev = Some(row.hash);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Widget {
        id: i64,
        name: &'static str,
    }

    impl Auditable for Widget {
        fn entity_name() -> &'static str {
            "widget"
        }

        fn entity_id(&self) -> String {
            self.id.to_string()
        }
    }

    #[tokio::test]
    async fn record_publishes_snapshots() {
        let (bus, mut rx) = init_event_bus();
        let ctx = AuditContext {
            actor_id: Some("u1".into()),
            correlation_id: Some("c-1".into()),
        };
        let before = Widget { id: 7, name: "old" };
        let after = Widget { id: 7, name: "new" };

        record(&bus, AuditAction::Updated, &ctx, &after, Some(&before));

        let event = rx.recv().await.expect("event");
        assert_eq!(event.name(), "widget.updated");
        assert_eq!(event.entity_id, "7");
        assert_eq!(event.old_values.as_ref().and_then(|v| v.get("name")), Some(&Value::from("old")));
        assert_eq!(event.new_values.as_ref().and_then(|v| v.get("name")), Some(&Value::from("new")));
        assert_eq!(event.severity, Severity::Important);
    }

    #[tokio::test]
    async fn deletions_keep_only_the_old_state() {
        let (bus, mut rx) = init_event_bus();
        record_deleted(&bus, &AuditContext::default(), &Widget { id: 1, name: "gone" });

        let event = rx.recv().await.expect("event");
        assert_eq!(event.action, AuditAction::Deleted);
        assert!(event.new_values.is_none());
        assert!(event.old_values.is_some());
        assert_eq!(event.severity, Severity::Critical);
    }

    #[test]
    fn tag_additions_are_noise() {
        let widget = Widget { id: 1, name: "w" };
        assert_eq!(widget.severity_for_action(AuditAction::TagsAdded), Severity::Noise);
        assert_eq!(widget.severity_for_action(AuditAction::RoleChanged), Severity::Critical);
        assert_eq!(widget.severity_for_action(AuditAction::Assigned), Severity::Important);
    }

    #[test]
    fn hash_depends_on_predecessor() {
        let fields = ChainedFields {
            entity_name: "task",
            entity_id: "1",
            action: "created",
            user_id: None,
            occurred_at: "2025-01-01T00:00:00.000000Z",
            old_values: None,
            new_values: Some("{}"),
            severity: "important",
        };
        let first = chain_hash(None, &fields);
        let second = chain_hash(Some(&first), &fields);
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(first, chain_hash(None, &fields));
    }
}
