use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod appointments;
pub mod auth;
pub mod cron;
pub mod employees;
pub mod health;
pub mod invoices;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = trimmed, "ignoring invalid CORS origin");
                        None
                    }
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let appointment_routes =
        Router::new().route("/:id/reassign", put(appointments::reassign_appointment));

    let employee_routes = Router::new()
        .route("/check-availability", post(employees::check_availability))
        .route("/vacation/request", post(employees::submit_vacation_request))
        .route("/vacation/list", get(employees::list_vacation_requests))
        .route(
            "/vacation/:id/decision",
            put(employees::decide_vacation_request),
        );

    let invoice_routes = Router::new()
        .route("/overdue", get(invoices::list_overdue_invoices))
        .route("/reminders", post(invoices::create_reminder))
        .route("/reminders/stats", get(invoices::reminder_stats))
        .route("/reminders/:id/sent", put(invoices::mark_reminder_sent))
        .route("/reminders/:id/failed", put(invoices::mark_reminder_failed));

    // cron endpoints authenticate with the shared secret, not a session
    let cron_routes = Router::new()
        .route("/recurring-expenses", get(cron::run_recurring_expenses))
        .route("/salary-expenses", get(cron::run_salary_expenses));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .route("/api/reassignments", get(appointments::list_reassignments))
        .nest("/api/appointments", appointment_routes)
        .nest("/api/employees", employee_routes)
        .nest("/api/invoices", invoice_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/cron", cron_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// RFC 3339 rendering of stored UTC timestamps.
pub(crate) fn to_iso(dt: chrono::NaiveDateTime) -> String {
    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(dt, chrono::Utc).to_rfc3339()
}
