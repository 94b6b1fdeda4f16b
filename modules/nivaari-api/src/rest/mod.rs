use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use nivaari_common::{
    BoundingBox, Coordinates, IncidentType, Location, MapPinView, PinSource, TimeWindow,
    ViewedFilter,
};
use nivaari_store::decisions::DECISION_STATUSES;
use nivaari_store::{
    CitizenReport, MapPin, ModeratorDecision, NewCitizenReport, NewMapPin, ReportSummary,
};

use crate::auth::{AdminSession, MaybeSession, ModeratorSession};
use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct MapFeedQuery {
    time: Option<String>,
    types: Option<String>,
    bbox: Option<String>,
    viewed: Option<String>,
}

#[derive(Deserialize)]
pub struct BboxQuery {
    bbox: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveQuery {
    moderator_user_id: Option<String>,
    viewed: Option<String>,
}

// --- Request bodies ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    title: String,
    #[serde(rename = "type")]
    report_type: String,
    category: Option<String>,
    description: String,
    city: Option<String>,
    location: Option<Location>,
    image_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePinRequest {
    label: String,
    type_id: String,
    description: Option<String>,
    location: Coordinates,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    #[serde(rename = "reportId")]
    report_id: String,
    decision: String,
}

#[derive(Deserialize)]
pub struct StatusPatchRequest {
    status: Option<String>,
}

// --- Helpers ---

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

fn not_found(message: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

fn internal_error(message: &str) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

fn pin_view(p: MapPin) -> MapPinView {
    MapPinView {
        id: p.id,
        source: PinSource::Current,
        label: p.label,
        type_id: IncidentType::normalize(Some(p.type_id.as_str())),
        description: p.description,
        location: p.location,
        status: p.status,
        image_url: None,
    }
}

fn decision_view(d: ModeratorDecision) -> Option<MapPinView> {
    let location = d.location.coordinates()?;
    Some(MapPinView {
        id: d.id,
        source: PinSource::Past,
        label: d.title,
        type_id: IncidentType::normalize(Some(d.report_type.as_str())),
        description: None,
        location,
        status: Some(d.status),
        image_url: d.image_url,
    })
}

fn report_view(r: CitizenReport) -> Option<MapPinView> {
    let location = r.location.coordinates()?;
    Some(MapPinView {
        id: r.id,
        source: PinSource::Incoming,
        label: r.title,
        type_id: IncidentType::normalize(Some(r.report_type.as_str())),
        description: Some(r.description),
        location,
        status: None,
        image_url: r.image_url,
    })
}

// --- Unified map feed ---

// GET /api/reports-map?time=current|past|incoming&types=a,b,c&bbox=minLat,minLng,maxLat,maxLng&viewed=all|accepted|rejected
pub async fn api_reports_map(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MapFeedQuery>,
) -> impl IntoResponse {
    let time = TimeWindow::parse(params.time.as_deref().unwrap_or("current"));
    let bbox = params.bbox.as_deref().and_then(BoundingBox::parse);
    let types = params.types.as_deref().and_then(IncidentType::parse_set);
    let viewed = ViewedFilter::parse(params.viewed.as_deref().unwrap_or("all"));

    let items: anyhow::Result<Vec<MapPinView>> = match time {
        TimeWindow::Current => MapPin::find_current(bbox.as_ref(), types.as_deref(), &state.pool)
            .await
            .map(|pins| pins.into_iter().map(pin_view).collect()),
        TimeWindow::Past => {
            ModeratorDecision::find_past(bbox.as_ref(), types.as_deref(), viewed, &state.pool)
                .await
                .map(|rows| rows.into_iter().filter_map(decision_view).collect())
        }
        TimeWindow::Incoming => {
            CitizenReport::find_incoming(bbox.as_ref(), types.as_deref(), &state.pool)
                .await
                .map(|rows| rows.into_iter().filter_map(report_view).collect())
        }
    };

    match items {
        Ok(items) => Json(serde_json::json!({ "items": items })).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load map data");
            internal_error("Failed to load map data")
        }
    }
}

// --- Citizen reports ---

// POST /api/citizen-reports — open to everyone; session only attributes.
pub async fn api_citizen_report_create(
    State(state): State<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
    Json(body): Json<CreateReportRequest>,
) -> impl IntoResponse {
    if body.title.trim().is_empty() {
        return bad_request("Title is required");
    }
    if body.report_type.trim().is_empty() {
        return bad_request("Type is required");
    }
    if body.description.trim().is_empty() {
        return bad_request("Description is required");
    }

    let new = NewCitizenReport {
        title: body.title.trim().to_string(),
        report_type: body.report_type.trim().to_string(),
        category: body.category,
        description: body.description,
        city: body.city,
        location: body.location.unwrap_or_default(),
        image_url: body.image_url,
        created_by_user_id: session.map(|s| s.user_id),
    };

    match CitizenReport::insert(&new, &state.pool).await {
        Ok(id) => Json(serde_json::json!({ "id": id })).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to create citizen report");
            internal_error("Failed to create report")
        }
    }
}

// GET /api/citizen-reports — public list of approved reports.
pub async fn api_citizen_reports_approved(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match ModeratorDecision::find_by_status("approved", 100, &state.pool).await {
        Ok(rows) => {
            let reports: Vec<serde_json::Value> = rows
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "title": r.title,
                        "type": r.report_type,
                        "city": r.city,
                        "location": r.location,
                        "decidedAt": r.decided_at,
                    })
                })
                .collect();
            Json(serde_json::json!({ "reports": reports })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load approved reports");
            internal_error("Failed to load reports")
        }
    }
}

// --- Moderation ---

// GET /api/moderator/reports — unreviewed citizen reports, newest first.
pub async fn api_unreviewed_reports(
    State(state): State<Arc<AppState>>,
    _session: ModeratorSession,
) -> impl IntoResponse {
    match CitizenReport::find_unreviewed(nivaari_store::MAP_FEED_CAP, &state.pool).await {
        Ok(reports) => Json(serde_json::json!({ "reports": reports })).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load unreviewed reports");
            internal_error("Failed to load reports")
        }
    }
}

// POST /api/moderator/reports — approve or reject a citizen report.
// Idempotent per report: a second decision overwrites the first.
pub async fn api_decide(
    State(state): State<Arc<AppState>>,
    ModeratorSession(session): ModeratorSession,
    Json(body): Json<DecisionRequest>,
) -> impl IntoResponse {
    if body.decision != "approved" && body.decision != "rejected" {
        return bad_request("Invalid decision");
    }
    let report_id = match Uuid::parse_str(&body.report_id) {
        Ok(id) => id,
        Err(_) => return bad_request("Invalid report id"),
    };

    let report = match CitizenReport::find_by_id(report_id, &state.pool).await {
        Ok(Some(report)) => report,
        Ok(None) => return not_found("Report not found"),
        Err(e) => {
            warn!(error = %e, "Failed to load report for decision");
            return internal_error("Failed to update report");
        }
    };

    match ModeratorDecision::upsert(&report, &body.decision, session.user_id, &state.pool).await {
        Ok(()) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to record decision");
            internal_error("Failed to update report")
        }
    }
}

// PATCH /api/moderator/reports/{id} — e.g. mark a decision as fixed.
pub async fn api_decision_update(
    State(state): State<Arc<AppState>>,
    _session: ModeratorSession,
    Path(id): Path<String>,
    Json(body): Json<StatusPatchRequest>,
) -> impl IntoResponse {
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return bad_request("Invalid ID"),
    };
    let status = match body.status.as_deref() {
        Some(s) if DECISION_STATUSES.contains(&s) => s.to_string(),
        Some(_) => return bad_request("Invalid status value"),
        None => return bad_request("Invalid status"),
    };

    match ModeratorDecision::set_status(id, &status, &state.pool).await {
        Ok(true) => Json(serde_json::json!({ "success": true })).into_response(),
        Ok(false) => not_found("Report not found"),
        Err(e) => {
            warn!(error = %e, "Failed to update decision");
            internal_error("Failed to update report")
        }
    }
}

// DELETE /api/moderator/reports/{id} — deleting a decision puts the source
// report back into the incoming/unreviewed feeds.
pub async fn api_decision_delete(
    State(state): State<Arc<AppState>>,
    _session: ModeratorSession,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return bad_request("Invalid ID"),
    };

    match ModeratorDecision::delete(id, &state.pool).await {
        Ok(true) => Json(serde_json::json!({ "success": true })).into_response(),
        Ok(false) => not_found("Report not found"),
        Err(e) => {
            warn!(error = %e, "Failed to delete decision");
            internal_error("Failed to delete report")
        }
    }
}

/// The archive shows two outcomes; `fixed` decisions were accepted first.
fn outcome(status: &str) -> &'static str {
    if status == "rejected" {
        "rejected"
    } else {
        "accepted"
    }
}

// GET /api/moderator/archive-reports — one moderator's decided history,
// their own unless moderatorUserId says otherwise.
pub async fn api_archive_reports(
    State(state): State<Arc<AppState>>,
    ModeratorSession(session): ModeratorSession,
    Query(params): Query<ArchiveQuery>,
) -> impl IntoResponse {
    let moderator_user_id = match params.moderator_user_id.as_deref() {
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => id,
            Err(_) => return bad_request("Invalid ID"),
        },
        None => session.user_id,
    };
    let viewed = ViewedFilter::parse(params.viewed.as_deref().unwrap_or("all"));

    match ModeratorDecision::find_by_moderator(moderator_user_id, viewed, &state.pool).await {
        Ok(rows) => {
            let reports: Vec<serde_json::Value> = rows
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "id": d.id,
                        "citizenReportId": d.citizen_report_id,
                        "title": d.title,
                        "type": d.report_type,
                        "city": d.city,
                        "location": d.location,
                        "status": d.status,
                        "decision": outcome(&d.status),
                        "decidedAt": d.decided_at,
                    })
                })
                .collect();
            Json(serde_json::json!({ "reports": reports })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load archive reports");
            internal_error("Failed to load reports")
        }
    }
}

// GET /api/moderator/reports/summary
pub async fn api_reports_summary(
    State(state): State<Arc<AppState>>,
    _session: ModeratorSession,
) -> impl IntoResponse {
    match ReportSummary::build(&state.pool).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to build report summary");
            internal_error("Failed to load summary")
        }
    }
}

// GET /api/admin/summary
pub async fn api_admin_summary(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
) -> impl IntoResponse {
    match ReportSummary::build(&state.pool).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to build admin summary");
            internal_error("Failed to load summary")
        }
    }
}

// --- Map pins ---

// POST /api/map-pins
pub async fn api_map_pin_create(
    State(state): State<Arc<AppState>>,
    ModeratorSession(session): ModeratorSession,
    Json(body): Json<CreatePinRequest>,
) -> impl IntoResponse {
    if body.label.trim().is_empty() {
        return bad_request("Label is required");
    }
    if body.type_id.trim().is_empty() {
        return bad_request("Type is required");
    }

    let new = NewMapPin {
        label: body.label.trim().to_string(),
        type_id: IncidentType::normalize(Some(body.type_id.as_str())),
        description: body.description,
        location: body.location,
        created_by_user_id: Some(session.user_id),
    };

    match MapPin::insert(&new, &state.pool).await {
        Ok(id) => Json(serde_json::json!({ "id": id })).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to create map pin");
            internal_error("Failed to create pin")
        }
    }
}

// GET /api/map-pins?bbox=minLat,minLng,maxLat,maxLng
pub async fn api_map_pins(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BboxQuery>,
) -> impl IntoResponse {
    let bbox = params.bbox.as_deref().and_then(BoundingBox::parse);

    match MapPin::find_current(bbox.as_ref(), None, &state.pool).await {
        Ok(pins) => {
            let pins: Vec<serde_json::Value> = pins
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "id": p.id,
                        "label": p.label,
                        "typeId": p.type_id,
                        "description": p.description,
                        "location": p.location,
                        "createdAt": p.created_at,
                    })
                })
                .collect();
            Json(serde_json::json!({ "pins": pins })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load map pins");
            internal_error("Failed to load pins")
        }
    }
}

// PATCH /api/map-pins/{id} — e.g. mark a pin as fixed.
pub async fn api_map_pin_update(
    State(state): State<Arc<AppState>>,
    _session: ModeratorSession,
    Path(id): Path<String>,
    Json(body): Json<StatusPatchRequest>,
) -> impl IntoResponse {
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return bad_request("Invalid ID"),
    };
    let status = match body.status.as_deref() {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => return bad_request("Invalid status"),
    };

    match MapPin::set_status(id, &status, &state.pool).await {
        Ok(true) => Json(serde_json::json!({ "success": true })).into_response(),
        Ok(false) => not_found("Pin not found"),
        Err(e) => {
            warn!(error = %e, "Failed to update map pin");
            internal_error("Failed to update pin")
        }
    }
}

// DELETE /api/map-pins/{id}
pub async fn api_map_pin_delete(
    State(state): State<Arc<AppState>>,
    _session: ModeratorSession,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return bad_request("Invalid ID"),
    };

    match MapPin::delete(id, &state.pool).await {
        Ok(true) => Json(serde_json::json!({ "success": true })).into_response(),
        Ok(false) => not_found("Pin not found"),
        Err(e) => {
            warn!(error = %e, "Failed to delete map pin");
            internal_error("Failed to delete pin")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_outcome_collapses_fixed_into_accepted() {
        assert_eq!(outcome("approved"), "accepted");
        assert_eq!(outcome("fixed"), "accepted");
        assert_eq!(outcome("rejected"), "rejected");
    }
}
