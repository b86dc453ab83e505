//! Postgres-backed collaboration store.
//!
//! Uniqueness of (project, receiver) invites and (project, creator)
//! collaborators is enforced by the schema; transitions are conditional
//! statements inside one transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;
use uuid::Uuid;

use showcase_collab::{
    normalize_email, CollabError, CollaborationInvite, Collaborator, CollaboratorRole,
    CreatorProfile, InviteResponse, InviteStatus, InviteTransition, Project,
};
use showcase_core::{InviteId, ProjectId, UserId};

use super::{CollaborationStore, CollaborationStoreError, InviteListing, InviteView};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS creator_profiles (
    id           UUID PRIMARY KEY,
    email        TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    active       BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS projects (
    id                 UUID PRIMARY KEY,
    primary_creator_id UUID NOT NULL REFERENCES creator_profiles (id),
    title              TEXT NOT NULL,
    created_at         TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS collaboration_invites (
    id           UUID PRIMARY KEY,
    project_id   UUID NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
    sender_id    UUID NOT NULL,
    receiver_id  UUID NOT NULL,
    status       TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'rejected')),
    created_at   TIMESTAMPTZ NOT NULL,
    responded_at TIMESTAMPTZ NULL,
    UNIQUE (project_id, receiver_id)
);

CREATE TABLE IF NOT EXISTS project_collaborators (
    project_id UUID NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
    creator_id UUID NOT NULL,
    role       TEXT NOT NULL DEFAULT 'collaborator',
    joined_at  TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (project_id, creator_id)
);
"#;

const INVITE_COLUMNS: &str =
    "i.id, i.project_id, i.sender_id, i.receiver_id, i.status, i.created_at, i.responded_at";

#[derive(Debug, Clone)]
pub struct PostgresCollaborationStore {
    pool: Arc<PgPool>,
}

impl PostgresCollaborationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), CollaborationStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    pub async fn upsert_creator(&self, creator: &CreatorProfile) -> Result<(), CollaborationStoreError> {
        sqlx::query(
            r#"
            INSERT INTO creator_profiles (id, email, display_name, active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
               SET email = EXCLUDED.email,
                   display_name = EXCLUDED.display_name,
                   active = EXCLUDED.active
            "#,
        )
        .bind(Uuid::from(creator.id))
        .bind(normalize_email(&creator.email))
        .bind(&creator.display_name)
        .bind(creator.active)
        .execute(&*self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    pub async fn insert_project(&self, project: &Project) -> Result<(), CollaborationStoreError> {
        sqlx::query(
            "INSERT INTO projects (id, primary_creator_id, title, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::from(project.id))
        .bind(Uuid::from(project.primary_creator_id))
        .bind(&project.title)
        .bind(project.created_at)
        .execute(&*self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn list_invites_where(
        &self,
        column: &str,
        counterpart: &str,
        creator_id: UserId,
    ) -> Result<Vec<InviteView>, CollaborationStoreError> {
        let sql = format!(
            r#"
            SELECT {INVITE_COLUMNS}, p.title AS project_title,
                   COALESCE(c.email, '') AS counterpart_email
              FROM collaboration_invites i
              JOIN projects p ON p.id = i.project_id
              LEFT JOIN creator_profiles c ON c.id = i.{counterpart}
             WHERE i.{column} = $1
             ORDER BY i.created_at DESC, i.id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(Uuid::from(creator_id))
            .fetch_all(&*self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|row| -> Result<InviteView, CollaborationStoreError> {
                Ok(InviteView {
                    invite: row_to_invite(row)?,
                    project_title: row.try_get("project_title").map_err(backend)?,
                    counterpart_email: row.try_get("counterpart_email").map_err(backend)?,
                })
            })
            .collect()
    }
}

fn backend(e: sqlx::Error) -> CollaborationStoreError {
    CollaborationStoreError::Backend(e.to_string())
}

fn row_to_invite(row: &PgRow) -> Result<CollaborationInvite, CollaborationStoreError> {
    let status: String = row.try_get("status").map_err(backend)?;
    let status: InviteStatus = status.parse().map_err(CollaborationStoreError::Backend)?;
    let responded_at: Option<DateTime<Utc>> = row.try_get("responded_at").map_err(backend)?;

    Ok(CollaborationInvite {
        id: InviteId::from_uuid(row.try_get("id").map_err(backend)?),
        project_id: ProjectId::from_uuid(row.try_get("project_id").map_err(backend)?),
        sender_id: UserId::from_uuid(row.try_get("sender_id").map_err(backend)?),
        receiver_id: UserId::from_uuid(row.try_get("receiver_id").map_err(backend)?),
        status,
        created_at: row.try_get("created_at").map_err(backend)?,
        responded_at,
    })
}

fn row_to_creator(row: &PgRow) -> Result<CreatorProfile, CollaborationStoreError> {
    Ok(CreatorProfile {
        id: UserId::from_uuid(row.try_get("id").map_err(backend)?),
        email: row.try_get("email").map_err(backend)?,
        display_name: row.try_get("display_name").map_err(backend)?,
        active: row.try_get("active").map_err(backend)?,
    })
}

fn row_to_collaborator(row: &PgRow) -> Result<Collaborator, CollaborationStoreError> {
    Ok(Collaborator {
        project_id: ProjectId::from_uuid(row.try_get("project_id").map_err(backend)?),
        creator_id: UserId::from_uuid(row.try_get("creator_id").map_err(backend)?),
        role: CollaboratorRole::Collaborator,
        joined_at: row.try_get("joined_at").map_err(backend)?,
    })
}

#[async_trait::async_trait]
impl CollaborationStore for PostgresCollaborationStore {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, CollaborationStoreError> {
        let row = sqlx::query("SELECT id, primary_creator_id, title, created_at FROM projects WHERE id = $1")
            .bind(Uuid::from(id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(backend)?;

        row.map(|row| -> Result<Project, CollaborationStoreError> {
            Ok(Project {
                id: ProjectId::from_uuid(row.try_get("id").map_err(backend)?),
                primary_creator_id: UserId::from_uuid(
                    row.try_get("primary_creator_id").map_err(backend)?,
                ),
                title: row.try_get("title").map_err(backend)?,
                created_at: row.try_get("created_at").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn get_creator(&self, id: UserId) -> Result<Option<CreatorProfile>, CollaborationStoreError> {
        let row = sqlx::query("SELECT id, email, display_name, active FROM creator_profiles WHERE id = $1")
            .bind(Uuid::from(id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_creator).transpose()
    }

    async fn find_creator_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CreatorProfile>, CollaborationStoreError> {
        let row = sqlx::query(
            "SELECT id, email, display_name, active FROM creator_profiles WHERE lower(email) = $1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&*self.pool)
        .await
        .map_err(backend)?;
        row.as_ref().map(row_to_creator).transpose()
    }

    async fn is_collaborator(
        &self,
        project_id: ProjectId,
        creator_id: UserId,
    ) -> Result<bool, CollaborationStoreError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM project_collaborators WHERE project_id = $1 AND creator_id = $2)",
        )
        .bind(Uuid::from(project_id))
        .bind(Uuid::from(creator_id))
        .fetch_one(&*self.pool)
        .await
        .map_err(backend)
    }

    async fn get_invite(
        &self,
        id: InviteId,
    ) -> Result<Option<CollaborationInvite>, CollaborationStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {INVITE_COLUMNS} FROM collaboration_invites i WHERE i.id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&*self.pool)
        .await
        .map_err(backend)?;
        row.as_ref().map(row_to_invite).transpose()
    }

    #[instrument(skip(self), err)]
    async fn open_invite(
        &self,
        project_id: ProjectId,
        sender_id: UserId,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<CollaborationInvite, CollaborationStoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let project_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
                .bind(Uuid::from(project_id))
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;
        if !project_exists {
            return Err(CollabError::ProjectNotFound(project_id).into());
        }

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM project_collaborators WHERE project_id = $1 AND creator_id = $2)",
        )
        .bind(Uuid::from(project_id))
        .bind(Uuid::from(receiver_id))
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;
        if already {
            return Err(CollabError::AlreadyCollaborator(receiver_id).into());
        }

        // Insert, or flip a rejected invite back to pending. Pending and
        // accepted rows are left untouched and return nothing.
        let upserted = sqlx::query(&format!(
            r#"
            INSERT INTO collaboration_invites AS i
                   (id, project_id, sender_id, receiver_id, status, created_at, responded_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, NULL)
            ON CONFLICT (project_id, receiver_id) DO UPDATE
               SET status = 'pending',
                   sender_id = EXCLUDED.sender_id,
                   created_at = EXCLUDED.created_at,
                   responded_at = NULL
             WHERE i.status = 'rejected'
            RETURNING {INVITE_COLUMNS}
            "#
        ))
        .bind(Uuid::from(InviteId::new()))
        .bind(Uuid::from(project_id))
        .bind(Uuid::from(sender_id))
        .bind(Uuid::from(receiver_id))
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(row) = upserted else {
            let status: String = sqlx::query_scalar(
                "SELECT status FROM collaboration_invites WHERE project_id = $1 AND receiver_id = $2",
            )
            .bind(Uuid::from(project_id))
            .bind(Uuid::from(receiver_id))
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
            return Err(match status.as_str() {
                "accepted" => CollabError::AlreadyCollaborator(receiver_id),
                _ => CollabError::InvitePending(receiver_id),
            }
            .into());
        };

        let invite = row_to_invite(&row)?;
        tx.commit().await.map_err(backend)?;
        Ok(invite)
    }

    #[instrument(skip(self), err)]
    async fn respond_invite(
        &self,
        invite_id: InviteId,
        responder_id: UserId,
        response: InviteResponse,
        now: DateTime<Utc>,
    ) -> Result<InviteTransition, CollaborationStoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query(&format!(
            "SELECT {INVITE_COLUMNS} FROM collaboration_invites i WHERE i.id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(invite_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .ok_or(CollabError::InviteNotFound(invite_id))?;

        let mut invite = row_to_invite(&row)?;
        let transition = invite.respond(responder_id, response, now)?;

        let updated = sqlx::query(
            r#"
            UPDATE collaboration_invites
               SET status = $2, responded_at = $3
             WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(Uuid::from(invite_id))
        .bind(transition.invite.status.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        if updated.rows_affected() == 0 {
            return Err(CollabError::InviteNotPending(invite_id).into());
        }

        if let Some(collaborator) = &transition.collaborator {
            sqlx::query(
                r#"
                INSERT INTO project_collaborators (project_id, creator_id, role, joined_at)
                VALUES ($1, $2, 'collaborator', $3)
                "#,
            )
            .bind(Uuid::from(collaborator.project_id))
            .bind(Uuid::from(collaborator.creator_id))
            .bind(collaborator.joined_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(transition)
    }

    #[instrument(skip(self), err)]
    async fn remove_collaborator(
        &self,
        project_id: ProjectId,
        creator_id: UserId,
    ) -> Result<Collaborator, CollaborationStoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query(
            r#"
            DELETE FROM project_collaborators
             WHERE project_id = $1 AND creator_id = $2
            RETURNING project_id, creator_id, joined_at
            "#,
        )
        .bind(Uuid::from(project_id))
        .bind(Uuid::from(creator_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .ok_or(CollabError::NotCollaborator(creator_id))?;
        let removed = row_to_collaborator(&row)?;

        sqlx::query(
            r#"
            DELETE FROM collaboration_invites
             WHERE project_id = $1 AND receiver_id = $2 AND status = 'accepted'
            "#,
        )
        .bind(Uuid::from(project_id))
        .bind(Uuid::from(creator_id))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(removed)
    }

    async fn list_collaborators(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Collaborator>, CollaborationStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT project_id, creator_id, joined_at
              FROM project_collaborators
             WHERE project_id = $1
             ORDER BY joined_at ASC
            "#,
        )
        .bind(Uuid::from(project_id))
        .fetch_all(&*self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_collaborator).collect()
    }

    async fn list_invites_for(&self, creator_id: UserId) -> Result<InviteListing, CollaborationStoreError> {
        Ok(InviteListing {
            received: self.list_invites_where("receiver_id", "sender_id", creator_id).await?,
            sent: self.list_invites_where("sender_id", "receiver_id", creator_id).await?,
        })
    }
}
