use anyhow::Result;
use chrono::{DateTime, Utc};
use nivaari_common::{BoundingBox, Coordinates, IncidentType};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::changes::{self, channel};
use crate::{push_bbox_filter, MAP_FEED_CAP};

/// A moderator-dropped map marker. Independent of citizen reports; shares
/// only the map rendering surface with them. `type_id` is canonical because
/// the pin form only offers canonical ids.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPin {
    pub id: Uuid,
    pub label: String,
    pub type_id: String,
    pub description: Option<String>,
    pub location: Coordinates,
    pub status: Option<String>,
    pub created_by_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for MapPin {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(MapPin {
            id: row.try_get("id")?,
            label: row.try_get("label")?,
            type_id: row.try_get("type_id")?,
            description: row.try_get("description")?,
            location: Coordinates {
                lat: row.try_get("lat")?,
                lng: row.try_get("lng")?,
            },
            status: row.try_get("status")?,
            created_by_user_id: row.try_get("created_by_user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMapPin {
    pub label: String,
    pub type_id: IncidentType,
    pub description: Option<String>,
    pub location: Coordinates,
    pub created_by_user_id: Option<Uuid>,
}

impl MapPin {
    pub async fn insert(new: &NewMapPin, pool: &PgPool) -> Result<Uuid> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO map_pins (label, type_id, description, lat, lng, created_by_user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&new.label)
        .bind(new.type_id.as_str())
        .bind(&new.description)
        .bind(new.location.lat)
        .bind(new.location.lng)
        .bind(new.created_by_user_id)
        .fetch_one(pool)
        .await?;

        changes::notify(pool, channel::MAP_PINS).await;
        Ok(row.0)
    }

    /// The `current` map feed: pins, optionally restricted to a viewport and
    /// a set of canonical types.
    pub async fn find_current(
        bbox: Option<&BoundingBox>,
        types: Option<&[IncidentType]>,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let mut qb = QueryBuilder::new("SELECT * FROM map_pins WHERE TRUE");
        if let Some(bbox) = bbox {
            push_bbox_filter(&mut qb, bbox);
        }
        if let Some(types) = types {
            let ids: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
            qb.push(" AND type_id = ANY(").push_bind(ids).push(")");
        }
        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(MAP_FEED_CAP);

        qb.build_query_as::<Self>()
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Patch a pin's status (the UI only ever sends "fixed").
    pub async fn set_status(id: Uuid, status: &str, pool: &PgPool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE map_pins SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(pool)
                .await?;

        if result.rows_affected() > 0 {
            changes::notify(pool, channel::MAP_PINS).await;
        }
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM map_pins WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() > 0 {
            changes::notify(pool, channel::MAP_PINS).await;
        }
        Ok(result.rows_affected() > 0)
    }
}
