use anyhow::Result;
use chrono::{DateTime, Utc};
use nivaari_common::{BoundingBox, IncidentType, Location, ViewedFilter};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::changes::{self, channel};
use crate::reports::CitizenReport;
use crate::{push_bbox_filter, push_raw_type_filter, MAP_FEED_CAP};

/// Statuses a decision may hold. `approved`/`rejected` are set by the
/// decide workflow; `fixed` is a later manual transition.
pub const DECISION_STATUSES: &[&str] = &["approved", "rejected", "fixed"];

/// A moderator's decision on a citizen report, keyed 1:1 by
/// `citizen_report_id`. Display fields are denormalized copies taken at
/// decision time so list views never join back to the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorDecision {
    pub id: Uuid,
    pub citizen_report_id: Uuid,
    pub status: String,
    pub moderator_user_id: Option<Uuid>,
    pub decided_at: DateTime<Utc>,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub city: Option<String>,
    pub location: Location,
    pub image_url: Option<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ModeratorDecision {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(ModeratorDecision {
            id: row.try_get("id")?,
            citizen_report_id: row.try_get("citizen_report_id")?,
            status: row.try_get("status")?,
            moderator_user_id: row.try_get("moderator_user_id")?,
            decided_at: row.try_get("decided_at")?,
            title: row.try_get("title")?,
            report_type: row.try_get("type")?,
            city: row.try_get("city")?,
            location: Location {
                lat: row.try_get("lat")?,
                lng: row.try_get("lng")?,
                address: row.try_get("address")?,
            },
            image_url: row.try_get("image_url")?,
        })
    }
}

/// Per-moderator decision tally, grouped by status.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DecisionCount {
    pub moderator_user_id: Option<Uuid>,
    pub status: String,
    pub count: i64,
}

impl ModeratorDecision {
    /// Record a decision. Atomic create-or-replace keyed by the report id:
    /// calling twice for the same report overwrites status/decided_at
    /// (last write wins) and never produces a second row.
    pub async fn upsert(
        report: &CitizenReport,
        decision: &str,
        moderator_user_id: Uuid,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO moderator_decisions
                (citizen_report_id, status, moderator_user_id, decided_at,
                 title, type, city, lat, lng, address, image_url)
            VALUES ($1, $2, $3, NOW(), $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (citizen_report_id) DO UPDATE SET
                status = EXCLUDED.status,
                moderator_user_id = EXCLUDED.moderator_user_id,
                decided_at = EXCLUDED.decided_at,
                title = EXCLUDED.title,
                type = EXCLUDED.type,
                city = EXCLUDED.city,
                lat = EXCLUDED.lat,
                lng = EXCLUDED.lng,
                address = EXCLUDED.address,
                image_url = EXCLUDED.image_url,
                updated_at = NOW()
            "#,
        )
        .bind(report.id)
        .bind(decision)
        .bind(moderator_user_id)
        .bind(&report.title)
        .bind(&report.report_type)
        .bind(&report.city)
        .bind(report.location.lat)
        .bind(report.location.lng)
        .bind(&report.location.address)
        .bind(&report.image_url)
        .execute(pool)
        .await?;

        changes::notify(pool, channel::MODERATOR_DECISIONS).await;
        Ok(())
    }

    /// The `past` map feed: decisions with numeric coordinates, restricted
    /// by viewed-filter status set, optional viewport and canonical types.
    pub async fn find_past(
        bbox: Option<&BoundingBox>,
        types: Option<&[IncidentType]>,
        viewed: ViewedFilter,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let statuses: Vec<String> = viewed.statuses().iter().map(|s| s.to_string()).collect();

        let mut qb = QueryBuilder::new(
            "SELECT * FROM moderator_decisions WHERE lat IS NOT NULL AND lng IS NOT NULL",
        );
        qb.push(" AND status = ANY(").push_bind(statuses).push(")");
        if let Some(bbox) = bbox {
            push_bbox_filter(&mut qb, bbox);
        }
        if let Some(types) = types {
            push_raw_type_filter(&mut qb, "type", types);
        }
        qb.push(" ORDER BY decided_at DESC LIMIT ").push_bind(MAP_FEED_CAP);

        qb.build_query_as::<Self>()
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// One moderator's decided history, newest first, restricted by the
    /// viewed-filter status set.
    pub async fn find_by_moderator(
        moderator_user_id: Uuid,
        viewed: ViewedFilter,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let statuses: Vec<String> = viewed.statuses().iter().map(|s| s.to_string()).collect();

        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM moderator_decisions
            WHERE moderator_user_id = $1
              AND status = ANY($2)
            ORDER BY decided_at DESC
            LIMIT $3
            "#,
        )
        .bind(moderator_user_id)
        .bind(&statuses)
        .bind(MAP_FEED_CAP)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_status(status: &str, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM moderator_decisions
            WHERE status = $1
            ORDER BY decided_at DESC
            LIMIT $2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Patch a decision's status. Returns false when the id matches nothing.
    /// Allowed-value validation happens at the API boundary.
    pub async fn set_status(id: Uuid, status: &str, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE moderator_decisions SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            changes::notify(pool, channel::MODERATOR_DECISIONS).await;
        }
        Ok(result.rows_affected() > 0)
    }

    /// Hard delete. If the source citizen report still exists it reappears
    /// in the incoming/unreviewed feeds — review state is derived from the
    /// presence of this row.
    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM moderator_decisions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() > 0 {
            changes::notify(pool, channel::MODERATOR_DECISIONS).await;
        }
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_by_status(status: &str, pool: &PgPool) -> Result<i64> {
        let row =
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM moderator_decisions WHERE status = $1")
                .bind(status)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }

    pub async fn counts_by_moderator(pool: &PgPool) -> Result<Vec<DecisionCount>> {
        sqlx::query_as::<_, DecisionCount>(
            r#"
            SELECT moderator_user_id, status, COUNT(*) AS count
            FROM moderator_decisions
            GROUP BY moderator_user_id, status
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
