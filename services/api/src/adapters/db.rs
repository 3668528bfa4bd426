//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courseforge_core::domain::{
    ContentPayload, ContentStatus, ConversationTurn, ModuleContent, Outline, ScopeKey,
};
use courseforge_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct OutlineRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    version: i32,
    modules: serde_json::Value,
}

impl OutlineRecord {
    fn to_domain(self) -> PortResult<Outline> {
        let modules = serde_json::from_value(self.modules)
            .map_err(|e| PortError::Unexpected(format!("Malformed outline modules: {}", e)))?;
        Ok(Outline {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            version: self.version as u32,
            modules,
        })
    }
}

#[derive(FromRow)]
struct ModuleContentRecord {
    id: Uuid,
    outline_id: Uuid,
    module_index: i32,
    lesson_index: Option<i32>,
    title: String,
    status: String,
    content: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl ModuleContentRecord {
    fn to_domain(self) -> PortResult<ModuleContent> {
        let status = ContentStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown content status '{}'", self.status))
        })?;
        let payload = serde_json::from_value(self.content)
            .map_err(|e| PortError::Unexpected(format!("Malformed content payload: {}", e)))?;
        Ok(ModuleContent {
            id: self.id,
            outline_id: self.outline_id,
            module_index: self.module_index as u32,
            lesson_index: self.lesson_index.map(|i| i as u32),
            title: self.title,
            status,
            payload,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: Uuid,
}

const CONTENT_COLUMNS: &str =
    "id, outline_id, module_index, lesson_index, title, status, content, updated_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(record.user_id)
    }

    async fn get_outline(&self, outline_id: Uuid) -> PortResult<Outline> {
        let record = sqlx::query_as::<_, OutlineRecord>(
            "SELECT id, user_id, title, description, version, modules FROM outlines WHERE id = $1",
        )
        .bind(outline_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Outline {} not found", outline_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn upsert_module_content(
        &self,
        scope: &ScopeKey,
        title: &str,
        payload: &ContentPayload,
        status: ContentStatus,
    ) -> PortResult<ModuleContent> {
        let content = serde_json::to_value(payload)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        // The unique index treats a NULL lesson_index as -1, so one record
        // per (outline, module[, lesson]) key: regeneration overwrites.
        let sql = format!(
            "INSERT INTO module_contents (id, outline_id, module_index, lesson_index, title, status, content, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
             ON CONFLICT (outline_id, module_index, COALESCE(lesson_index, -1)) \
             DO UPDATE SET title = EXCLUDED.title, status = EXCLUDED.status, \
                           content = EXCLUDED.content, updated_at = now() \
             RETURNING {}",
            CONTENT_COLUMNS
        );
        let record = sqlx::query_as::<_, ModuleContentRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(scope.outline_id)
            .bind(scope.module_index as i32)
            .bind(scope.lesson_index.map(|i| i as i32))
            .bind(title)
            .bind(status.as_str())
            .bind(content)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_module_content(&self, content_id: Uuid) -> PortResult<ModuleContent> {
        let sql = format!(
            "SELECT {} FROM module_contents WHERE id = $1",
            CONTENT_COLUMNS
        );
        let record = sqlx::query_as::<_, ModuleContentRecord>(&sql)
            .bind(content_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Content {} not found", content_id))
                }
                _ => unexpected(e),
            })?;
        record.to_domain()
    }

    async fn update_module_content(
        &self,
        content_id: Uuid,
        title: &str,
        payload: &ContentPayload,
    ) -> PortResult<ModuleContent> {
        let content = serde_json::to_value(payload)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let sql = format!(
            "UPDATE module_contents SET title = $2, content = $3, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            CONTENT_COLUMNS
        );
        let record = sqlx::query_as::<_, ModuleContentRecord>(&sql)
            .bind(content_id)
            .bind(title)
            .bind(content)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Content {} not found", content_id))
                }
                _ => unexpected(e),
            })?;
        record.to_domain()
    }

    async fn list_module_contents(&self, outline_id: Uuid) -> PortResult<Vec<ModuleContent>> {
        let sql = format!(
            "SELECT {} FROM module_contents \
             WHERE outline_id = $1 AND lesson_index IS NULL ORDER BY module_index ASC",
            CONTENT_COLUMNS
        );
        let records = sqlx::query_as::<_, ModuleContentRecord>(&sql)
            .bind(outline_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_lesson_contents(&self, outline_id: Uuid) -> PortResult<Vec<ModuleContent>> {
        let sql = format!(
            "SELECT {} FROM module_contents \
             WHERE outline_id = $1 AND lesson_index IS NOT NULL \
             ORDER BY module_index ASC, lesson_index ASC",
            CONTENT_COLUMNS
        );
        let records = sqlx::query_as::<_, ModuleContentRecord>(&sql)
            .bind(outline_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn save_content_session(
        &self,
        user_id: Uuid,
        scope: &ScopeKey,
        transcript: &[ConversationTurn],
    ) -> PortResult<()> {
        let transcript = serde_json::to_value(transcript)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(
            "INSERT INTO content_sessions (id, user_id, outline_id, module_index, lesson_index, transcript) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(scope.outline_id)
        .bind(scope.module_index as i32)
        .bind(scope.lesson_index.map(|i| i as i32))
        .bind(transcript)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
