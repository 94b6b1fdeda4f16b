use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, patch},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nivaari_common::Config;

mod auth;
mod rest;
mod stream;

use auth::JwtService;

pub struct AppState {
    pub pool: PgPool,
    pub jwt: JwtService,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nivaari=info".parse()?))
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;

    let state = Arc::new(AppState {
        pool,
        jwt: JwtService::new(&config.session_secret, "nivaari".to_string()),
    });

    let app = Router::new()
        // Health check
        .route("/health", get(|| async { "ok" }))
        // Unified map feed
        .route("/api/reports-map", get(rest::api_reports_map))
        // Citizen reports
        .route(
            "/api/citizen-reports",
            get(rest::api_citizen_reports_approved).post(rest::api_citizen_report_create),
        )
        // Map pins
        .route(
            "/api/map-pins",
            get(rest::api_map_pins).post(rest::api_map_pin_create),
        )
        .route(
            "/api/map-pins/{id}",
            patch(rest::api_map_pin_update).delete(rest::api_map_pin_delete),
        )
        // Moderation
        .route(
            "/api/moderator/reports",
            get(rest::api_unreviewed_reports).post(rest::api_decide),
        )
        .route(
            "/api/moderator/reports/{id}",
            patch(rest::api_decision_update).delete(rest::api_decision_delete),
        )
        .route("/api/moderator/reports/summary", get(rest::api_reports_summary))
        .route("/api/moderator/archive-reports", get(rest::api_archive_reports))
        .route("/api/admin/summary", get(rest::api_admin_summary))
        // Live dashboards (SSE)
        .route("/api/moderator/reports/stream", get(stream::moderator_stream))
        .route("/api/admin/moderators/stream", get(stream::admin_stream))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path + status + latency only (no query params)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Nivaari API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
