//! Postgres-backed audit log.
//!
//! Only INSERT and SELECT are issued against `audit_logs`; the table can be
//! granted to the application role without UPDATE/DELETE.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tracing::instrument;
use uuid::Uuid;

use showcase_auth::ActorKind;
use showcase_core::{AuditLogId, UserId};

use super::{
    AuditFilter, AuditLog, AuditLogEntry, AuditOrder, AuditPage, AuditStoreError, NewAuditEntry,
    Pagination,
};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit_logs (
    id          UUID PRIMARY KEY,
    actor_id    UUID NULL,
    actor_type  TEXT NOT NULL,
    action      TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id   TEXT NULL,
    metadata    JSONB NOT NULL DEFAULT '{}'::jsonb,
    ip_address  TEXT NULL,
    user_agent  TEXT NULL,
    created_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS audit_logs_created_at_idx ON audit_logs (created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS audit_logs_entity_idx ON audit_logs (entity_type, entity_id);
CREATE INDEX IF NOT EXISTS audit_logs_actor_idx ON audit_logs (actor_id);
"#;

const COLUMNS: &str = "id, actor_id, actor_type, action, entity_type, entity_id, metadata, ip_address, user_agent, created_at";

#[derive(Debug, Clone)]
pub struct PostgresAuditLog {
    pool: Arc<PgPool>,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the table and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), AuditStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn map_sqlx_error(e: sqlx::Error) -> AuditStoreError {
    AuditStoreError::Storage(e.to_string())
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a AuditFilter) {
    if let Some(actor_id) = filter.actor_id {
        qb.push(" AND actor_id = ").push_bind(*actor_id.as_uuid());
    }
    if let Some(actor_type) = filter.actor_type {
        qb.push(" AND actor_type = ").push_bind(actor_type.as_str());
    }
    if let Some(action) = filter.action.as_deref() {
        qb.push(" AND action = ").push_bind(action);
    }
    if let Some(entity_type) = filter.entity_type.as_deref() {
        qb.push(" AND entity_type = ").push_bind(entity_type);
    }
    if let Some(entity_id) = filter.entity_id.as_deref() {
        qb.push(" AND entity_id = ").push_bind(entity_id);
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.created_to {
        qb.push(" AND created_at < ").push_bind(to);
    }
}

fn row_to_entry(row: &PgRow) -> Result<AuditLogEntry, AuditStoreError> {
    let corrupt = |e: sqlx::Error| AuditStoreError::Corrupt(e.to_string());

    let actor_type: String = row.try_get("actor_type").map_err(corrupt)?;
    let actor_type: ActorKind = actor_type.parse().map_err(AuditStoreError::Corrupt)?;
    let actor_id: Option<Uuid> = row.try_get("actor_id").map_err(corrupt)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;

    Ok(AuditLogEntry {
        id: AuditLogId::from_uuid(row.try_get("id").map_err(corrupt)?),
        actor_id: actor_id.map(UserId::from_uuid),
        actor_type,
        action: row.try_get("action").map_err(corrupt)?,
        entity_type: row.try_get("entity_type").map_err(corrupt)?,
        entity_id: row.try_get("entity_id").map_err(corrupt)?,
        metadata: row.try_get("metadata").map_err(corrupt)?,
        ip_address: row.try_get("ip_address").map_err(corrupt)?,
        user_agent: row.try_get("user_agent").map_err(corrupt)?,
        created_at,
    })
}

#[async_trait::async_trait]
impl AuditLog for PostgresAuditLog {
    #[instrument(skip(self, entry), fields(action = %entry.action), err)]
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AuditStoreError> {
        let written = entry.into_entry(AuditLogId::new());

        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, actor_id, actor_type, action, entity_type, entity_id,
                                    metadata, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*written.id.as_uuid())
        .bind(written.actor_id.map(Uuid::from))
        .bind(written.actor_type.as_str())
        .bind(&written.action)
        .bind(&written.entity_type)
        .bind(&written.entity_id)
        .bind(&written.metadata)
        .bind(&written.ip_address)
        .bind(&written.user_agent)
        .bind(written.created_at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(written)
    }

    #[instrument(skip(self, filter), err)]
    async fn query(
        &self,
        filter: &AuditFilter,
        order: AuditOrder,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditStoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs WHERE TRUE");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM audit_logs WHERE TRUE"
        ));
        push_filters(&mut select, filter);
        select.push(match order {
            AuditOrder::NewestFirst => " ORDER BY created_at DESC, id DESC",
            AuditOrder::OldestFirst => " ORDER BY created_at ASC, id ASC",
        });
        select
            .push(" LIMIT ")
            .push_bind(i64::from(pagination.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(pagination.offset));

        let rows = select
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let records = rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()?;

        Ok(AuditPage::new(records, total.max(0) as u64, pagination))
    }
}
