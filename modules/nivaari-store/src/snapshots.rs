//! Point-in-time dashboard materializations pushed over the live update
//! channels. Builders are pure reads: their sub-queries have no data
//! dependency on each other and run concurrently, and an empty store yields
//! empty arrays and zero counts rather than an error.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use nivaari_common::Location;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::decisions::ModeratorDecision;
use crate::moderators::ModeratorRosterRow;
use crate::reports::CitizenReport;
use crate::MAP_FEED_CAP;

/// Decisions shown per status column on the moderator dashboard.
const DECIDED_CAP: i64 = 200;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicReport {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub description: String,
    pub location: Location,
    pub created_at: DateTime<Utc>,
}

impl From<CitizenReport> for BasicReport {
    fn from(r: CitizenReport) -> Self {
        Self {
            id: r.id,
            title: r.title,
            report_type: r.report_type,
            city: r.city,
            description: r.description,
            location: r.location,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionReport {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl From<ModeratorDecision> for DecisionReport {
    fn from(d: ModeratorDecision) -> Self {
        Self {
            id: d.id,
            title: d.title,
            report_type: d.report_type,
            city: d.city,
            decided_at: d.decided_at,
        }
    }
}

/// Everything the moderator dashboard shows, assembled wholesale.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorSnapshot {
    pub unreviewed: Vec<BasicReport>,
    pub approved: Vec<DecisionReport>,
    pub rejected: Vec<DecisionReport>,
}

impl ModeratorSnapshot {
    pub async fn build(pool: &PgPool) -> Result<Self> {
        let (unreviewed, approved, rejected) = tokio::try_join!(
            CitizenReport::find_unreviewed(MAP_FEED_CAP, pool),
            ModeratorDecision::find_by_status("approved", DECIDED_CAP, pool),
            ModeratorDecision::find_by_status("rejected", DECIDED_CAP, pool),
        )?;

        Ok(Self {
            unreviewed: unreviewed.into_iter().map(Into::into).collect(),
            approved: approved.into_iter().map(Into::into).collect(),
            rejected: rejected.into_iter().map(Into::into).collect(),
        })
    }
}

/// Headline counts for the summary endpoints: everything submitted, how it
/// was decided, and what still waits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: i64,
    pub approved: i64,
    pub rejected: i64,
    pub unviewed: i64,
}

impl ReportSummary {
    pub async fn build(pool: &PgPool) -> Result<Self> {
        let (total, approved, rejected, unviewed) = tokio::try_join!(
            CitizenReport::total_count(pool),
            ModeratorDecision::count_by_status("approved", pool),
            ModeratorDecision::count_by_status("rejected", pool),
            CitizenReport::unviewed_count(pool),
        )?;

        Ok(Self {
            total,
            approved,
            rejected,
            unviewed,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorListItem {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub approved_count: i64,
    pub rejected_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backlog {
    pub unviewed_count: i64,
}

/// The admin dashboard: moderator roster with per-moderator decision
/// tallies, plus the global unreviewed backlog count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSnapshot {
    pub moderators: Vec<ModeratorListItem>,
    pub backlog: Backlog,
}

impl AdminSnapshot {
    pub async fn build(pool: &PgPool) -> Result<Self> {
        let (roster, counts, unviewed_count) = tokio::try_join!(
            ModeratorRosterRow::list(MAP_FEED_CAP, pool),
            ModeratorDecision::counts_by_moderator(pool),
            CitizenReport::unviewed_count(pool),
        )?;

        let mut tallies: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for row in counts {
            let Some(user_id) = row.moderator_user_id else {
                continue;
            };
            let entry = tallies.entry(user_id).or_default();
            match row.status.as_str() {
                "approved" => entry.0 = row.count,
                "rejected" => entry.1 = row.count,
                _ => {}
            }
        }

        let moderators = roster
            .into_iter()
            .map(|m| {
                let (approved_count, rejected_count) = m
                    .user_id
                    .and_then(|id| tallies.get(&id).copied())
                    .unwrap_or((0, 0));
                let name = m
                    .name
                    .clone()
                    .or_else(|| m.email.split('@').next().map(str::to_string))
                    .unwrap_or_else(|| "Moderator".to_string());
                ModeratorListItem {
                    id: m.id,
                    user_id: m.user_id,
                    name,
                    email: m.email,
                    status: m.status,
                    created_at: m.created_at,
                    approved_count,
                    rejected_count,
                }
            })
            .collect();

        Ok(Self {
            moderators,
            backlog: Backlog { unviewed_count },
        })
    }
}
