//! Relational side of the library on PostgreSQL
//!
//! Participants and every row that joins a participant to a work. Status
//! changes are single conditional UPDATE statements.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::ParticipantRole;
use crate::library::{
    Bookmark, IdentityStore, LinkageStore, Participant, PurchaseGrant, ReviewLink, ReviewStatus,
    WorkLink, WorkStatus,
};
use crate::types::{LibraryError, Result};

const CREATE_PARTICIPANTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS participants (
    id TEXT PRIMARY KEY,
    nickname TEXT NOT NULL UNIQUE,
    web3_address TEXT NOT NULL UNIQUE,
    role SMALLINT NOT NULL DEFAULT 1,
    language TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_PARTICIPANTS_WORKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS participants_works (
    id TEXT PRIMARY KEY,
    participant_id TEXT NOT NULL,
    work_id TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_PARTICIPANTS_WORKS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_participants_works_participant ON participants_works (participant_id)
"#;

const CREATE_PARTICIPANTS_WORK_REVIEWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS participants_work_reviews (
    id TEXT PRIMARY KEY,
    participant_id TEXT NOT NULL,
    work_id TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (participant_id, work_id)
)
"#;

const CREATE_PARTICIPANTS_PURPOSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS participants_purposes (
    id TEXT PRIMARY KEY,
    participant_id TEXT NOT NULL,
    work_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_PARTICIPANTS_PURPOSES_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_participants_purposes_pair ON participants_purposes (participant_id, work_id)
"#;

const CREATE_PARTICIPANTS_BOOKMARKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS participants_bookmarks (
    id TEXT PRIMARY KEY,
    participant_id TEXT NOT NULL,
    work_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (participant_id, work_id)
)
"#;

/// Participants and linkage rows in PostgreSQL
#[derive(Clone)]
pub struct PgLinkageStore {
    pool: PgPool,
}

impl PgLinkageStore {
    /// Connect to PostgreSQL
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(url)
            .await
            .map_err(|e| LibraryError::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL successfully");

        Ok(Self { pool })
    }

    /// Create tables and indexes that do not exist yet
    pub async fn run_migrations(&self) -> Result<()> {
        let migrations = [
            CREATE_PARTICIPANTS_TABLE,
            CREATE_PARTICIPANTS_WORKS_TABLE,
            CREATE_PARTICIPANTS_WORKS_INDEX,
            CREATE_PARTICIPANTS_WORK_REVIEWS_TABLE,
            CREATE_PARTICIPANTS_PURPOSES_TABLE,
            CREATE_PARTICIPANTS_PURPOSES_INDEX,
            CREATE_PARTICIPANTS_BOOKMARKS_TABLE,
        ];

        for migration in migrations {
            sqlx::query(migration)
                .execute(&self.pool)
                .await
                .map_err(|e| LibraryError::Database(format!("Migration failed: {}", e)))?;
        }

        debug!("PostgreSQL migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        debug!("Closing PostgreSQL connection pool");
        self.pool.close().await;
    }
}

fn participant_from_row(row: &PgRow) -> Result<Participant> {
    let code: i16 = row.try_get("role")?;
    let role = ParticipantRole::from_code(code.into())
        .ok_or_else(|| LibraryError::Database(format!("unknown role code {code} in store")))?;
    Ok(Participant {
        id: row.try_get("id")?,
        nickname: row.try_get("nickname")?,
        web3_address: row.try_get("web3_address")?,
        role,
        language: row.try_get("language")?,
        created_at: row.try_get("created_at")?,
    })
}

fn stored<T: std::str::FromStr<Err = LibraryError>>(raw: String) -> Result<T> {
    raw.parse()
        .map_err(|e: LibraryError| LibraryError::Database(format!("corrupt status in store: {e}")))
}

fn work_link_from_row(row: &PgRow) -> Result<WorkLink> {
    Ok(WorkLink {
        id: row.try_get("id")?,
        participant_id: row.try_get("participant_id")?,
        work_id: row.try_get("work_id")?,
        status: stored(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn review_link_from_row(row: &PgRow) -> Result<ReviewLink> {
    Ok(ReviewLink {
        id: row.try_get("id")?,
        participant_id: row.try_get("participant_id")?,
        work_id: row.try_get("work_id")?,
        status: stored(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn grant_from_row(row: &PgRow) -> Result<PurchaseGrant> {
    Ok(PurchaseGrant {
        id: row.try_get("id")?,
        participant_id: row.try_get("participant_id")?,
        work_id: row.try_get("work_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl IdentityStore for PgLinkageStore {
    async fn create_participant(&self, participant: Participant) -> Result<Participant> {
        let result = sqlx::query(
            r#"
            INSERT INTO participants (id, nickname, web3_address, role, language, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&participant.id)
        .bind(&participant.nickname)
        .bind(&participant.web3_address)
        .bind(participant.role.code())
        .bind(&participant.language)
        .bind(participant.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(participant),
            Err(e) if unique_violation(&e) => Err(LibraryError::Conflict(format!(
                "participant {} already exists",
                participant.web3_address
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn participant_by_address(&self, address: &str) -> Result<Option<Participant>> {
        let row = sqlx::query("SELECT * FROM participants WHERE web3_address = $1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(participant_from_row).transpose()
    }

    async fn participant_by_id(&self, id: &str) -> Result<Option<Participant>> {
        let row = sqlx::query("SELECT * FROM participants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(participant_from_row).transpose()
    }

    async fn update_role(&self, id: &str, role: ParticipantRole) -> Result<ParticipantRole> {
        let code: i16 = sqlx::query_scalar(
            "UPDATE participants SET role = GREATEST(role, $2) WHERE id = $1 RETURNING role",
        )
        .bind(id)
        .bind(role.code())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LibraryError::NotFound(format!("participant {id}")))?;
        ParticipantRole::from_code(code.into())
            .ok_or_else(|| LibraryError::Database(format!("unknown role code {code} in store")))
    }

    async fn update_nickname(&self, id: &str, nickname: &str) -> Result<()> {
        let result = sqlx::query("UPDATE participants SET nickname = $2 WHERE id = $1")
            .bind(id)
            .bind(nickname)
            .execute(&self.pool)
            .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => {
                Err(LibraryError::NotFound(format!("participant {id}")))
            }
            Ok(_) => Ok(()),
            Err(e) if unique_violation(&e) => Err(LibraryError::Conflict(format!(
                "nickname {nickname} is taken"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl LinkageStore for PgLinkageStore {
    async fn create_work_link(&self, link: &WorkLink) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO participants_works (id, participant_id, work_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&link.id)
        .bind(&link.participant_id)
        .bind(&link.work_id)
        .bind(link.status.as_str())
        .bind(link.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if unique_violation(&e) => Err(LibraryError::Conflict(format!(
                "work {} already has a linkage row",
                link.work_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn work_link(&self, work_id: &str) -> Result<Option<WorkLink>> {
        let row = sqlx::query("SELECT * FROM participants_works WHERE work_id = $1")
            .bind(work_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(work_link_from_row).transpose()
    }

    async fn work_links(&self) -> Result<Vec<WorkLink>> {
        let rows = sqlx::query("SELECT * FROM participants_works ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(work_link_from_row).collect()
    }

    async fn work_links_by_author(&self, participant_id: &str) -> Result<Vec<WorkLink>> {
        let rows = sqlx::query(
            "SELECT * FROM participants_works WHERE participant_id = $1 ORDER BY created_at DESC",
        )
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(work_link_from_row).collect()
    }

    async fn work_links_by_status(&self, status: WorkStatus) -> Result<Vec<WorkLink>> {
        let rows = sqlx::query(
            "SELECT * FROM participants_works WHERE status = $1 ORDER BY created_at DESC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(work_link_from_row).collect()
    }

    async fn transition_work_status(
        &self,
        work_id: &str,
        expected: WorkStatus,
        next: WorkStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE participants_works SET status = $3 WHERE work_id = $1 AND status = $2",
        )
        .bind(work_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_work_link(&self, work_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM participants_works WHERE work_id = $1")
            .bind(work_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn review_link(
        &self,
        participant_id: &str,
        work_id: &str,
    ) -> Result<Option<ReviewLink>> {
        let row = sqlx::query(
            "SELECT * FROM participants_work_reviews WHERE participant_id = $1 AND work_id = $2",
        )
        .bind(participant_id)
        .bind(work_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(review_link_from_row).transpose()
    }

    async fn ensure_review_link(&self, link: ReviewLink) -> Result<ReviewLink> {
        sqlx::query(
            r#"
            INSERT INTO participants_work_reviews
                (id, participant_id, work_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (participant_id, work_id) DO NOTHING
            "#,
        )
        .bind(&link.id)
        .bind(&link.participant_id)
        .bind(&link.work_id)
        .bind(link.status.as_str())
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(&self.pool)
        .await?;

        self.review_link(&link.participant_id, &link.work_id)
            .await?
            .ok_or_else(|| {
                LibraryError::Database(format!(
                    "review row for work {} vanished after insert",
                    link.work_id
                ))
            })
    }

    async fn review_links(&self, work_id: &str) -> Result<Vec<ReviewLink>> {
        let rows = sqlx::query(
            "SELECT * FROM participants_work_reviews WHERE work_id = $1 ORDER BY created_at",
        )
        .bind(work_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(review_link_from_row).collect()
    }

    async fn set_review_status(
        &self,
        id: &str,
        status: ReviewStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE participants_work_reviews SET status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound(format!("review {id}")));
        }
        Ok(())
    }

    async fn create_grant(&self, grant: &PurchaseGrant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO participants_purposes (id, participant_id, work_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&grant.id)
        .bind(&grant.participant_id)
        .bind(&grant.work_id)
        .bind(grant.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn grants(&self, participant_id: &str, work_id: &str) -> Result<Vec<PurchaseGrant>> {
        let rows = sqlx::query(
            "SELECT * FROM participants_purposes WHERE participant_id = $1 AND work_id = $2",
        )
        .bind(participant_id)
        .bind(work_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(grant_from_row).collect()
    }

    async fn grants_by_participant(&self, participant_id: &str) -> Result<Vec<PurchaseGrant>> {
        let rows = sqlx::query("SELECT * FROM participants_purposes WHERE participant_id = $1")
            .bind(participant_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(grant_from_row).collect()
    }

    async fn delete_grants(&self, work_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM participants_purposes WHERE work_id = $1")
            .bind(work_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn create_bookmark(&self, bookmark: &Bookmark) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO participants_bookmarks (id, participant_id, work_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (participant_id, work_id) DO NOTHING
            "#,
        )
        .bind(&bookmark.id)
        .bind(&bookmark.participant_id)
        .bind(&bookmark.work_id)
        .bind(bookmark.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_bookmark(&self, participant_id: &str, work_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM participants_bookmarks WHERE participant_id = $1 AND work_id = $2",
        )
        .bind(participant_id)
        .bind(work_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn bookmarked_work_ids(&self, participant_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT work_id FROM participants_bookmarks WHERE participant_id = $1 ORDER BY created_at DESC",
        )
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get("work_id").map_err(LibraryError::from))
            .collect()
    }

    async fn delete_bookmark(&self, participant_id: &str, work_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM participants_bookmarks WHERE participant_id = $1 AND work_id = $2",
        )
        .bind(participant_id)
        .bind(work_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_bookmarks(&self, work_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM participants_bookmarks WHERE work_id = $1")
            .bind(work_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
