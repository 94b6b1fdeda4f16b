pub mod changes;
pub mod decisions;
pub mod moderators;
pub mod pins;
pub mod reports;
pub mod snapshots;

pub use changes::ChangeFeed;
pub use decisions::ModeratorDecision;
pub use moderators::ModeratorRosterRow;
pub use pins::{MapPin, NewMapPin};
pub use reports::{CitizenReport, NewCitizenReport};
pub use snapshots::{AdminSnapshot, ModeratorSnapshot, ReportSummary};

use nivaari_common::IncidentType;
use sqlx::{Postgres, QueryBuilder};

/// Feed queries are capped; the client re-filters against its viewport.
pub const MAP_FEED_CAP: i64 = 500;

/// Append a bbox predicate on flat `lat`/`lng` columns (closed intervals).
pub(crate) fn push_bbox_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    bbox: &nivaari_common::BoundingBox,
) {
    qb.push(" AND lat BETWEEN ")
        .push_bind(bbox.min_lat)
        .push(" AND ")
        .push_bind(bbox.max_lat)
        .push(" AND lng BETWEEN ")
        .push_bind(bbox.min_lng)
        .push(" AND ")
        .push_bind(bbox.max_lng);
}

/// Append a type predicate over a *raw* label column, matching the
/// normalizer's semantics: each requested canonical type selects every known
/// label that normalizes into it, and `other` additionally matches any label
/// the synonym table does not know.
pub(crate) fn push_raw_type_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    types: &[IncidentType],
) {
    let selected: Vec<String> = types
        .iter()
        .flat_map(|t| t.raw_labels())
        .map(str::to_string)
        .collect();

    qb.push(" AND (lower(trim(")
        .push(column)
        .push(")) = ANY(")
        .push_bind(selected)
        .push(")");

    if types.contains(&IncidentType::Other) {
        let known: Vec<String> = IncidentType::known_concrete_labels()
            .into_iter()
            .map(str::to_string)
            .collect();
        qb.push(" OR NOT (lower(trim(")
            .push(column)
            .push(")) = ANY(")
            .push_bind(known)
            .push("))");
    }

    qb.push(")");
}
