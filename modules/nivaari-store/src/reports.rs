use anyhow::Result;
use chrono::{DateTime, Utc};
use nivaari_common::{BoundingBox, IncidentType, Location};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::changes::{self, channel};
use crate::{push_bbox_filter, push_raw_type_filter, MAP_FEED_CAP};

/// A citizen-submitted report. `report_type` is the raw label as entered;
/// normalization happens on read. Review state is never stored here — a
/// report counts as reviewed exactly when a moderator decision references it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenReport {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub category: Option<String>,
    pub description: String,
    pub city: Option<String>,
    pub location: Location,
    pub image_url: Option<String>,
    pub status: String,
    pub created_by_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CitizenReport {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(CitizenReport {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            report_type: row.try_get("type")?,
            category: row.try_get("category")?,
            description: row.try_get("description")?,
            city: row.try_get("city")?,
            location: Location {
                lat: row.try_get("lat")?,
                lng: row.try_get("lng")?,
                address: row.try_get("address")?,
            },
            image_url: row.try_get("image_url")?,
            status: row.try_get("status")?,
            created_by_user_id: row.try_get("created_by_user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCitizenReport {
    pub title: String,
    pub report_type: String,
    pub category: Option<String>,
    pub description: String,
    pub city: Option<String>,
    pub location: Location,
    pub image_url: Option<String>,
    pub created_by_user_id: Option<Uuid>,
}

impl CitizenReport {
    pub async fn insert(new: &NewCitizenReport, pool: &PgPool) -> Result<Uuid> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO citizen_reports
                (title, type, category, description, city, lat, lng, address, image_url, created_by_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&new.title)
        .bind(&new.report_type)
        .bind(&new.category)
        .bind(&new.description)
        .bind(&new.city)
        .bind(new.location.lat)
        .bind(new.location.lng)
        .bind(&new.location.address)
        .bind(&new.image_url)
        .bind(new.created_by_user_id)
        .fetch_one(pool)
        .await?;

        changes::notify(pool, channel::CITIZEN_REPORTS).await;
        Ok(row.0)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM citizen_reports WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Submitted reports with no moderator decision yet, newest first.
    /// The anti-join is the single source of truth for review state:
    /// deleting a decision makes its report reappear here.
    pub async fn find_unreviewed(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM citizen_reports r
            WHERE r.status = 'submitted'
              AND NOT EXISTS (
                  SELECT 1 FROM moderator_decisions d WHERE d.citizen_report_id = r.id
              )
            ORDER BY r.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// The `incoming` map feed: unreviewed reports with numeric coordinates,
    /// optionally restricted to a viewport and a set of canonical types.
    pub async fn find_incoming(
        bbox: Option<&BoundingBox>,
        types: Option<&[IncidentType]>,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let mut qb = QueryBuilder::new(
            "SELECT * FROM citizen_reports \
             WHERE status = 'submitted' \
               AND lat IS NOT NULL AND lng IS NOT NULL \
               AND NOT EXISTS (\
                   SELECT 1 FROM moderator_decisions d \
                   WHERE d.citizen_report_id = citizen_reports.id\
               )",
        );
        if let Some(bbox) = bbox {
            push_bbox_filter(&mut qb, bbox);
        }
        if let Some(types) = types {
            push_raw_type_filter(&mut qb, "type", types);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(MAP_FEED_CAP);

        qb.build_query_as::<Self>()
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn total_count(pool: &PgPool) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM citizen_reports")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Count of reports with no decision, independent of any feed cap.
    pub async fn unviewed_count(pool: &PgPool) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT COUNT(*) FROM citizen_reports r
            WHERE r.status = 'submitted'
              AND NOT EXISTS (
                  SELECT 1 FROM moderator_decisions d WHERE d.citizen_report_id = r.id
              )
            "#,
        )
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
