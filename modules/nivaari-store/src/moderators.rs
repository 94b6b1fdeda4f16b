use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// One moderator roster entry, preferring the live user record over the
/// possibly stale copy on the moderators row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModeratorRosterRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl ModeratorRosterRow {
    pub async fn list(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT
                m.id,
                m.user_id,
                u.name,
                COALESCE(u.email, m.email) AS email,
                COALESCE(u.status, m.status) AS status,
                COALESCE(u.created_at, m.created_at) AS created_at
            FROM moderators m
            LEFT JOIN users u ON u.id = m.user_id
            ORDER BY m.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
