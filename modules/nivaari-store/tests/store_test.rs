//! Integration tests for the report/decision/pin store.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use nivaari_common::{BoundingBox, Coordinates, IncidentType, Location, ViewedFilter};
use nivaari_store::{
    AdminSnapshot, CitizenReport, MapPin, ModeratorDecision, ModeratorSnapshot, NewCitizenReport,
    NewMapPin, ReportSummary,
};
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    sqlx::migrate!("../../migrations").run(&pool).await.ok()?;

    sqlx::query(
        "TRUNCATE citizen_reports, moderator_decisions, map_pins, moderators, users CASCADE",
    )
    .execute(&pool)
    .await
    .ok()?;

    Some(pool)
}

fn report(title: &str, report_type: &str, lat: f64, lng: f64) -> NewCitizenReport {
    NewCitizenReport {
        title: title.to_string(),
        report_type: report_type.to_string(),
        description: format!("{title} description"),
        city: Some("Pune".to_string()),
        location: Location {
            lat: Some(lat),
            lng: Some(lng),
            address: None,
        },
        ..Default::default()
    }
}

async fn insert_user(pool: &PgPool, name: Option<&str>, email: &str) -> Uuid {
    sqlx::query_as::<_, (Uuid,)>(
        "INSERT INTO users (name, email, role) VALUES ($1, $2, 'moderator') RETURNING id",
    )
    .bind(name)
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
    .0
}

async fn insert_moderator(pool: &PgPool, user_id: Option<Uuid>, email: &str) {
    sqlx::query("INSERT INTO moderators (user_id, email) VALUES ($1, $2)")
        .bind(user_id)
        .bind(email)
        .execute(pool)
        .await
        .unwrap();
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn decision_lifecycle_moves_report_between_feeds() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let id = CitizenReport::insert(&report("Pothole on main road", "Road Damage", 18.52, 73.85), &pool)
        .await
        .unwrap();

    // Undecided: visible in both unreviewed and incoming.
    let unreviewed = CitizenReport::find_unreviewed(500, &pool).await.unwrap();
    assert_eq!(unreviewed.len(), 1);
    let incoming = CitizenReport::find_incoming(None, None, &pool).await.unwrap();
    assert_eq!(incoming.len(), 1);

    // Approve it.
    let r = CitizenReport::find_by_id(id, &pool).await.unwrap().unwrap();
    let moderator = Uuid::new_v4();
    ModeratorDecision::upsert(&r, "approved", moderator, &pool).await.unwrap();

    assert!(CitizenReport::find_unreviewed(500, &pool).await.unwrap().is_empty());
    assert!(CitizenReport::find_incoming(None, None, &pool).await.unwrap().is_empty());

    let past = ModeratorDecision::find_past(None, None, ViewedFilter::All, &pool)
        .await
        .unwrap();
    assert_eq!(past.len(), 1);
    assert_eq!(past[0].citizen_report_id, id);
    assert_eq!(past[0].status, "approved");
    assert_eq!(past[0].title, "Pothole on main road");

    // Delete the decision: the report reappears in the incoming feeds.
    assert!(ModeratorDecision::delete(past[0].id, &pool).await.unwrap());
    assert_eq!(CitizenReport::find_unreviewed(500, &pool).await.unwrap().len(), 1);
    assert_eq!(CitizenReport::find_incoming(None, None, &pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deciding_twice_overwrites_without_a_second_row() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let id = CitizenReport::insert(&report("Broken light", "Electricity", 18.5, 73.8), &pool)
        .await
        .unwrap();
    let r = CitizenReport::find_by_id(id, &pool).await.unwrap().unwrap();

    let m1 = Uuid::new_v4();
    let m2 = Uuid::new_v4();
    ModeratorDecision::upsert(&r, "approved", m1, &pool).await.unwrap();
    ModeratorDecision::upsert(&r, "rejected", m2, &pool).await.unwrap();

    let all = ModeratorDecision::find_past(None, None, ViewedFilter::All, &pool)
        .await
        .unwrap();
    assert_eq!(all.len(), 1, "one decision row per report");
    assert_eq!(all[0].status, "rejected");
    assert_eq!(all[0].moderator_user_id, Some(m2));
}

#[tokio::test]
async fn viewed_filter_selects_status_sets() {
    let Some(pool) = test_pool().await else {
        return;
    };

    for (title, decision) in [("a", "approved"), ("b", "rejected"), ("c", "fixed")] {
        let id = CitizenReport::insert(&report(title, "garbage", 18.5, 73.8), &pool)
            .await
            .unwrap();
        let r = CitizenReport::find_by_id(id, &pool).await.unwrap().unwrap();
        // "fixed" is a later transition; the decide workflow only writes
        // approved/rejected.
        let initial = if decision == "fixed" { "approved" } else { decision };
        ModeratorDecision::upsert(&r, initial, Uuid::new_v4(), &pool).await.unwrap();
        if decision == "fixed" {
            let row = ModeratorDecision::find_past(None, None, ViewedFilter::All, &pool)
                .await
                .unwrap()
                .into_iter()
                .find(|d| d.citizen_report_id == id)
                .unwrap();
            assert!(ModeratorDecision::set_status(row.id, "fixed", &pool).await.unwrap());
        }
    }

    let accepted = ModeratorDecision::find_past(None, None, ViewedFilter::Accepted, &pool)
        .await
        .unwrap();
    assert_eq!(accepted.len(), 2, "approved + fixed count as accepted");

    let rejected = ModeratorDecision::find_past(None, None, ViewedFilter::Rejected, &pool)
        .await
        .unwrap();
    assert_eq!(rejected.len(), 1);

    let all = ModeratorDecision::find_past(None, None, ViewedFilter::All, &pool)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn bbox_filter_is_inclusive_and_corner_order_insensitive() {
    let Some(pool) = test_pool().await else {
        return;
    };

    CitizenReport::insert(&report("inside", "water", 12.5, 77.5), &pool).await.unwrap();
    CitizenReport::insert(&report("on-edge", "water", 12.0, 77.0), &pool).await.unwrap();
    CitizenReport::insert(&report("outside", "water", 20.0, 80.0), &pool).await.unwrap();

    // Corners given max-first still select the same viewport.
    let bbox = BoundingBox::parse("13.0,78.0,12.0,77.0").unwrap();
    let rows = CitizenReport::find_incoming(Some(&bbox), None, &pool).await.unwrap();
    let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(rows.len(), 2);
    assert!(titles.contains(&"inside"));
    assert!(titles.contains(&"on-edge"));
}

#[tokio::test]
async fn type_filter_matches_raw_labels_through_normalization() {
    let Some(pool) = test_pool().await else {
        return;
    };

    CitizenReport::insert(&report("r1", "Road Damage", 18.5, 73.8), &pool).await.unwrap();
    CitizenReport::insert(&report("r2", "potholes", 18.5, 73.8), &pool).await.unwrap();
    CitizenReport::insert(&report("r3", "Water Supply", 18.5, 73.8), &pool).await.unwrap();
    CitizenReport::insert(&report("r4", "ufo sighting", 18.5, 73.8), &pool).await.unwrap();
    CitizenReport::insert(&report("r5", "Healthcare", 18.5, 73.8), &pool).await.unwrap();

    let potholes = CitizenReport::find_incoming(None, Some(&[IncidentType::Potholes]), &pool)
        .await
        .unwrap();
    assert_eq!(potholes.len(), 2, "raw label and canonical id both match");

    let water = CitizenReport::find_incoming(None, Some(&[IncidentType::Water]), &pool)
        .await
        .unwrap();
    assert_eq!(water.len(), 1);

    // `other` picks up unknown labels and known other-synonyms alike.
    let other = CitizenReport::find_incoming(None, Some(&[IncidentType::Other]), &pool)
        .await
        .unwrap();
    assert_eq!(other.len(), 2);

    let combined = CitizenReport::find_incoming(
        None,
        Some(&[IncidentType::Potholes, IncidentType::Other]),
        &pool,
    )
    .await
    .unwrap();
    assert_eq!(combined.len(), 4);
}

#[tokio::test]
async fn incoming_feed_is_newest_first() {
    let Some(pool) = test_pool().await else {
        return;
    };

    for i in 0..3 {
        CitizenReport::insert(&report(&format!("r{i}"), "garbage", 18.5, 73.8), &pool)
            .await
            .unwrap();
        // created_at has microsecond resolution; force distinct timestamps.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let rows = CitizenReport::find_incoming(None, None, &pool).await.unwrap();
    let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["r2", "r1", "r0"]);
}

#[tokio::test]
async fn listing_caps_bound_rows_and_keep_newest() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let m = Uuid::new_v4();
    for i in 0..5 {
        let id = CitizenReport::insert(&report(&format!("d{i}"), "garbage", 18.5, 73.8), &pool)
            .await
            .unwrap();
        let r = CitizenReport::find_by_id(id, &pool).await.unwrap().unwrap();
        ModeratorDecision::upsert(&r, "approved", m, &pool).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    // The cap drops the oldest rows, never the newest.
    let capped = ModeratorDecision::find_by_status("approved", 3, &pool).await.unwrap();
    assert_eq!(capped.len(), 3);
    let titles: Vec<&str> = capped.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["d4", "d3", "d2"]);

    for i in 0..4 {
        CitizenReport::insert(&report(&format!("u{i}"), "garbage", 18.5, 73.8), &pool)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let capped = CitizenReport::find_unreviewed(2, &pool).await.unwrap();
    assert_eq!(capped.len(), 2);
    let titles: Vec<&str> = capped.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["u3", "u2"]);

    // The full backlog count is independent of any listing cap.
    assert_eq!(CitizenReport::unviewed_count(&pool).await.unwrap(), 4);
}

#[tokio::test]
async fn archive_lists_one_moderators_history() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let m1 = Uuid::new_v4();
    let m2 = Uuid::new_v4();

    for (title, moderator, decision) in [
        ("first", m1, "approved"),
        ("second", m1, "rejected"),
        ("third", m2, "approved"),
    ] {
        let id = CitizenReport::insert(&report(title, "garbage", 18.5, 73.8), &pool)
            .await
            .unwrap();
        let r = CitizenReport::find_by_id(id, &pool).await.unwrap().unwrap();
        ModeratorDecision::upsert(&r, decision, moderator, &pool).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let history = ModeratorDecision::find_by_moderator(m1, ViewedFilter::All, &pool)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    let titles: Vec<&str> = history.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["second", "first"], "newest decided first");

    let accepted = ModeratorDecision::find_by_moderator(m1, ViewedFilter::Accepted, &pool)
        .await
        .unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].title, "first");

    let other = ModeratorDecision::find_by_moderator(m2, ViewedFilter::All, &pool)
        .await
        .unwrap();
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].title, "third");
}

#[tokio::test]
async fn report_summary_counts_totals_and_backlog() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let empty = ReportSummary::build(&pool).await.unwrap();
    assert_eq!(empty.total, 0);
    assert_eq!(empty.approved, 0);
    assert_eq!(empty.rejected, 0);
    assert_eq!(empty.unviewed, 0);

    let m = Uuid::new_v4();
    for (title, decision) in [("a", Some("approved")), ("b", Some("rejected")), ("c", None)] {
        let id = CitizenReport::insert(&report(title, "garbage", 18.5, 73.8), &pool)
            .await
            .unwrap();
        if let Some(decision) = decision {
            let r = CitizenReport::find_by_id(id, &pool).await.unwrap().unwrap();
            ModeratorDecision::upsert(&r, decision, m, &pool).await.unwrap();
        }
    }

    let summary = ReportSummary::build(&pool).await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.approved, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.unviewed, 1);
}

#[tokio::test]
async fn reports_without_coordinates_stay_off_the_map() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let new = NewCitizenReport {
        title: "address only".to_string(),
        report_type: "garbage".to_string(),
        description: "no coords".to_string(),
        location: Location {
            lat: None,
            lng: None,
            address: Some("12 MG Road".to_string()),
        },
        ..Default::default()
    };
    CitizenReport::insert(&new, &pool).await.unwrap();

    assert!(CitizenReport::find_incoming(None, None, &pool).await.unwrap().is_empty());
    // Still reviewable, just not mappable.
    assert_eq!(CitizenReport::find_unreviewed(500, &pool).await.unwrap().len(), 1);
    assert_eq!(CitizenReport::unviewed_count(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn map_pin_crud_and_current_feed() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let pin_id = MapPin::insert(
        &NewMapPin {
            label: "Flooded underpass".to_string(),
            type_id: IncidentType::Water,
            description: Some("avoid after rain".to_string()),
            location: Coordinates { lat: 18.51, lng: 73.86 },
            created_by_user_id: None,
        },
        &pool,
    )
    .await
    .unwrap();

    let pins = MapPin::find_current(None, None, &pool).await.unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0].type_id, "water");
    assert_eq!(pins[0].status, None);

    let water = MapPin::find_current(None, Some(&[IncidentType::Water]), &pool).await.unwrap();
    assert_eq!(water.len(), 1);
    let trees = MapPin::find_current(None, Some(&[IncidentType::Trees]), &pool).await.unwrap();
    assert!(trees.is_empty());

    assert!(MapPin::set_status(pin_id, "fixed", &pool).await.unwrap());
    let pins = MapPin::find_current(None, None, &pool).await.unwrap();
    assert_eq!(pins[0].status.as_deref(), Some("fixed"));

    assert!(MapPin::delete(pin_id, &pool).await.unwrap());
    assert!(!MapPin::delete(pin_id, &pool).await.unwrap());
    assert!(MapPin::find_current(None, None, &pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn moderator_snapshot_splits_by_review_state() {
    let Some(pool) = test_pool().await else {
        return;
    };

    // Empty store yields empty arrays, not an error.
    let empty = ModeratorSnapshot::build(&pool).await.unwrap();
    assert!(empty.unreviewed.is_empty());
    assert!(empty.approved.is_empty());
    assert!(empty.rejected.is_empty());

    let pending = CitizenReport::insert(&report("pending", "traffic", 18.5, 73.8), &pool)
        .await
        .unwrap();
    let approved = CitizenReport::insert(&report("good", "garbage", 18.5, 73.8), &pool)
        .await
        .unwrap();
    let rejected = CitizenReport::insert(&report("spam", "danger", 18.5, 73.8), &pool)
        .await
        .unwrap();

    let m = Uuid::new_v4();
    let r = CitizenReport::find_by_id(approved, &pool).await.unwrap().unwrap();
    ModeratorDecision::upsert(&r, "approved", m, &pool).await.unwrap();
    let r = CitizenReport::find_by_id(rejected, &pool).await.unwrap().unwrap();
    ModeratorDecision::upsert(&r, "rejected", m, &pool).await.unwrap();

    let snapshot = ModeratorSnapshot::build(&pool).await.unwrap();
    assert_eq!(snapshot.unreviewed.len(), 1);
    assert_eq!(snapshot.unreviewed[0].id, pending);
    assert_eq!(snapshot.approved.len(), 1);
    assert_eq!(snapshot.approved[0].title, "good");
    assert_eq!(snapshot.rejected.len(), 1);
    assert_eq!(snapshot.rejected[0].title, "spam");
}

#[tokio::test]
async fn admin_snapshot_tallies_decisions_per_moderator() {
    let Some(pool) = test_pool().await else {
        return;
    };

    // Empty store still materializes.
    let empty = AdminSnapshot::build(&pool).await.unwrap();
    assert!(empty.moderators.is_empty());
    assert_eq!(empty.backlog.unviewed_count, 0);

    let named = insert_user(&pool, Some("Asha"), "asha@example.com").await;
    let unnamed = insert_user(&pool, None, "ravi@example.com").await;
    insert_moderator(&pool, Some(named), "asha@example.com").await;
    insert_moderator(&pool, Some(unnamed), "ravi@example.com").await;
    // Invited but never signed up: no user row.
    insert_moderator(&pool, None, "pending@example.com").await;

    for (title, moderator, decision) in [
        ("one", named, "approved"),
        ("two", named, "approved"),
        ("three", named, "rejected"),
        ("four", unnamed, "rejected"),
    ] {
        let id = CitizenReport::insert(&report(title, "garbage", 18.5, 73.8), &pool)
            .await
            .unwrap();
        let r = CitizenReport::find_by_id(id, &pool).await.unwrap().unwrap();
        ModeratorDecision::upsert(&r, decision, moderator, &pool).await.unwrap();
    }
    CitizenReport::insert(&report("backlog", "garbage", 18.5, 73.8), &pool)
        .await
        .unwrap();

    let snapshot = AdminSnapshot::build(&pool).await.unwrap();
    assert_eq!(snapshot.moderators.len(), 3);
    assert_eq!(snapshot.backlog.unviewed_count, 1);

    let asha = snapshot
        .moderators
        .iter()
        .find(|m| m.email == "asha@example.com")
        .unwrap();
    assert_eq!(asha.name, "Asha");
    assert_eq!(asha.approved_count, 2);
    assert_eq!(asha.rejected_count, 1);

    // No user name: fall back to the email local part.
    let ravi = snapshot
        .moderators
        .iter()
        .find(|m| m.email == "ravi@example.com")
        .unwrap();
    assert_eq!(ravi.name, "ravi");
    assert_eq!(ravi.approved_count, 0);
    assert_eq!(ravi.rejected_count, 1);

    let pending = snapshot
        .moderators
        .iter()
        .find(|m| m.email == "pending@example.com")
        .unwrap();
    assert_eq!(pending.name, "pending");
    assert_eq!(pending.approved_count, 0);
    assert_eq!(pending.rejected_count, 0);
}

#[tokio::test]
async fn report_scenario_road_damage_to_accepted_pin() {
    let Some(pool) = test_pool().await else {
        return;
    };

    // A citizen files "Road Damage"; on the map it is an incoming pothole.
    let id = CitizenReport::insert(&report("Crater near school", "Road Damage", 18.52, 73.85), &pool)
        .await
        .unwrap();

    let incoming = CitizenReport::find_incoming(None, Some(&[IncidentType::Potholes]), &pool)
        .await
        .unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].id, id);

    // A moderator approves it; it moves to the past/accepted surface.
    let r = CitizenReport::find_by_id(id, &pool).await.unwrap().unwrap();
    ModeratorDecision::upsert(&r, "approved", Uuid::new_v4(), &pool).await.unwrap();

    assert!(CitizenReport::find_incoming(None, None, &pool).await.unwrap().is_empty());
    let past = ModeratorDecision::find_past(
        None,
        Some(&[IncidentType::Potholes]),
        ViewedFilter::Accepted,
        &pool,
    )
    .await
    .unwrap();
    assert_eq!(past.len(), 1);
    assert_eq!(past[0].title, "Crater near school");
    assert_eq!(past[0].report_type, "Road Damage");
}
