//! Admin surface — visibility into anomalies, per-principal activity, and
//! the log store, plus the administrative clear. Read-only except for log
//! maintenance and the clear endpoint.

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use praetor_core::types::{now_ms, Severity};
use praetor_store::log_store::LogKind;

use crate::server::AppState;

/// Returned rows are capped so the admin surface stays cheap to query.
const MAX_ANOMALY_ROWS: usize = 100;
const MAX_EVENT_ROWS: usize = 50;

#[derive(Deserialize)]
pub struct PeriodQuery {
    pub hours: Option<f64>,
    pub severity: Option<String>,
}

/// Export/cleanup bodies are optional: a bare POST gets the defaults.
#[derive(Deserialize)]
pub struct ExportRequest {
    #[serde(default = "default_log_kind")]
    pub log_type: LogKind,
    #[serde(default = "default_hours")]
    pub hours: f64,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self { log_type: default_log_kind(), hours: default_hours() }
    }
}

fn default_log_kind() -> LogKind {
    LogKind::Anomalies
}

fn default_hours() -> f64 {
    24.0
}

#[derive(Deserialize)]
pub struct CleanupRequest {
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep: u32,
}

impl Default for CleanupRequest {
    fn default() -> Self {
        Self { days_to_keep: default_days_to_keep() }
    }
}

fn default_days_to_keep() -> u32 {
    30
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/security/stats", get(handle_security_stats))
        .route("/anomalies", get(handle_anomalies))
        .route("/user/:user_id/activity", get(handle_user_activity))
        .route("/user/:user_id/anomalies", get(handle_user_anomalies))
        .route("/health", get(handle_health))
        .route("/dashboard", get(handle_dashboard))
        .route("/config/anomaly-profiles", get(handle_profiles))
        .route("/logs/export", post(handle_export))
        .route("/logs/cleanup", post(handle_cleanup))
        .route("/detector/clear/:user_id", post(handle_clear))
        .route_layer(middleware::from_fn_with_state(state, admin_auth))
}

async fn admin_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(ref expected) = state.admin_token {
        let auth_header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        match auth_header {
            Some(val) if val.strip_prefix("Bearer ").map_or(false, |t| t == expected) => {}
            _ => {
                warn!("unauthorized admin request rejected");
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "invalid or missing admin token" })),
                )
                    .into_response();
            }
        }
    }
    next.run(req).await
}

fn parse_severity(value: &str) -> Option<Severity> {
    match value.to_ascii_lowercase().as_str() {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

async fn handle_security_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.gateway.store().security_stats(24.0);
    let mut top: Vec<(String, u64)> = stats.top_affected_users.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1));
    top.truncate(10);
    let top: Vec<serde_json::Value> = top
        .into_iter()
        .map(|(user, count)| json!({ "user": user, "count": count }))
        .collect();

    Json(json!({
        "period_hours": 24,
        "stats": {
            "total_events": stats.total_events,
            "total_anomalies": stats.total_anomalies,
            "total_blocked_attempts": stats.total_blocked_attempts,
        },
        "anomalies_by_severity": stats.anomalies_by_severity,
        "anomaly_types": stats.anomaly_types,
        "top_affected_users": top,
    }))
}

async fn handle_anomalies(
    State(state): State<AppState>,
    Query(q): Query<PeriodQuery>,
) -> impl IntoResponse {
    let hours = q.hours.unwrap_or(24.0);
    let severity = q.severity.as_deref().and_then(parse_severity);
    let anomalies = state.gateway.store().anomalies(hours, severity);
    let recent = &anomalies[anomalies.len().saturating_sub(MAX_ANOMALY_ROWS)..];

    Json(json!({
        "count": anomalies.len(),
        "filter": {
            "hours": hours,
            "severity": q.severity.as_deref().unwrap_or("all"),
        },
        "anomalies": recent,
    }))
}

async fn handle_user_activity(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(q): Query<PeriodQuery>,
) -> impl IntoResponse {
    let hours = q.hours.unwrap_or(24.0);
    let events = state.gateway.store().events_by_user(Some(&user_id), hours);
    let recent = &events[events.len().saturating_sub(MAX_EVENT_ROWS)..];
    let stats = state.gateway.tracker().stats(&user_id);

    Json(json!({
        "user_id": user_id,
        "period_hours": hours,
        "stats": stats,
        "events": recent,
    }))
}

async fn handle_user_anomalies(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(q): Query<PeriodQuery>,
) -> impl IntoResponse {
    let hours = q.hours.unwrap_or(24.0);
    let anomalies: Vec<_> = state
        .gateway
        .store()
        .anomalies(hours, None)
        .into_iter()
        .filter(|a| a.user_id == user_id)
        .collect();

    Json(json!({
        "user_id": user_id,
        "count": anomalies.len(),
        "anomalies": anomalies,
    }))
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.gateway.store().security_stats(1.0);
    let recent = state.gateway.store().anomalies(0.1, None);
    let critical = recent
        .iter()
        .filter(|a| a.findings.iter().any(|f| f.severity == Severity::Critical))
        .count();

    Json(json!({
        "status": "operational",
        "timestamp_ms": now_ms(),
        "last_hour": {
            "events": stats.total_events,
            "anomalies": stats.total_anomalies,
            "blocked": stats.total_blocked_attempts,
        },
        "recent_anomalies": {
            "count": recent.len(),
            "critical": critical,
        },
        "system": {
            "detector_evaluations": state.gateway.detector().total_evaluations(),
            "tracked_principals": state.gateway.tracker().tracked_count(),
        },
    }))
}

async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let stats_24h = state.gateway.store().security_stats(24.0);
    let stats_1h = state.gateway.store().security_stats(1.0);
    let recent = state.gateway.store().anomalies(0.25, None);

    let mut top_types: Vec<(_, u64)> = stats_24h.anomaly_types.iter().map(|(k, v)| (*k, *v)).collect();
    top_types.sort_by(|a, b| b.1.cmp(&a.1));
    top_types.truncate(5);
    let top_types: Vec<serde_json::Value> = top_types
        .into_iter()
        .map(|(kind, count)| json!({ "type": kind, "count": count }))
        .collect();

    let count_sev = |sev: Severity| {
        recent
            .iter()
            .filter(|a| a.findings.iter().any(|f| f.severity == sev))
            .count()
    };

    Json(json!({
        "timestamp_ms": now_ms(),
        "period_24h": {
            "total_events": stats_24h.total_events,
            "total_anomalies": stats_24h.total_anomalies,
            "blocked": stats_24h.total_blocked_attempts,
            "anomalies_by_severity": stats_24h.anomalies_by_severity,
            "top_anomaly_types": top_types,
        },
        "period_1h": {
            "total_events": stats_1h.total_events,
            "total_anomalies": stats_1h.total_anomalies,
            "blocked": stats_1h.total_blocked_attempts,
        },
        "recent_alerts": {
            "critical_last_15_min": count_sev(Severity::Critical),
            "high_last_15_min": count_sev(Severity::High),
        },
    }))
}

async fn handle_profiles(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "profiles": state.gateway.policy().profiles(),
        "description": "anomaly profiles set detection thresholds per role",
    }))
}

async fn handle_export(
    State(state): State<AppState>,
    body: Option<Json<ExportRequest>>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let csv = match state.gateway.store().export_csv(req.log_type, req.hours) {
        Ok(csv) => csv,
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };
    if csv.lines().count() <= 1 {
        return Json(json!({ "message": "no data to export" })).into_response();
    }

    let kind = match req.log_type {
        LogKind::Events => "events",
        LogKind::Anomalies => "anomalies",
    };
    let filename = format!(
        "praetor_{}_{}.csv",
        kind,
        chrono::Utc::now().format("%Y-%m-%d")
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response()
}

async fn handle_cleanup(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    state.gateway.store().cleanup_old_logs(req.days_to_keep);
    Json(json!({
        "message": "log cleanup complete",
        "days_to_keep": req.days_to_keep,
        "timestamp_ms": now_ms(),
    }))
}

async fn handle_clear(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    state.gateway.tracker().clear(&user_id);
    Json(json!({
        "message": format!("tracked state cleared for {}", user_id),
        "timestamp_ms": now_ms(),
    }))
}
