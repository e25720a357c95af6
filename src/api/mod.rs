mod audit;
pub mod auth;
mod error;
pub mod events;
mod instructors;
mod leads;
mod lessons;
pub mod metrics;
pub mod rate_limit;
mod reviews;
mod site;
mod stats;
mod students;
mod users;
mod validation;
mod vehicles;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public form and content routes, rate limited per IP
    let public_routes = Router::new()
        .route("/leads", post(leads::create_lead))
        .route("/reviews", post(reviews::create_review))
        .route("/reviews", get(reviews::list_public_reviews))
        .route("/reviews/summary", get(reviews::review_summary))
        .route("/site/profile", get(site::get_site_profile))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_public,
        ));

    // Auth routes (handlers check credentials themselves)
    let auth_routes = Router::new()
        .route("/setup-status", get(auth::setup_status))
        .route("/setup", post(auth::setup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // WebSocket routes (auth handled in handlers via query param)
    let ws_routes = Router::new().route("/events/stream", get(events::events_ws));

    // Admin dashboard routes
    let admin_routes = Router::new()
        // Leads
        .route("/leads", get(leads::list_leads))
        .route("/leads/:id", get(leads::get_lead))
        .route("/leads/:id/read", post(leads::mark_lead_read))
        .route("/leads/:id", delete(leads::delete_lead))
        // Reviews (moderation)
        .route("/reviews/pending", get(reviews::list_pending_reviews))
        .route("/reviews/all", get(reviews::list_all_reviews))
        .route("/reviews/:id/approve", post(reviews::approve_review))
        .route("/reviews/:id", delete(reviews::delete_review))
        // Students
        .route("/students", get(students::list_students))
        .route("/students", post(students::create_student))
        .route("/students/:id", get(students::get_student))
        .route("/students/:id", put(students::update_student))
        .route("/students/:id", delete(students::delete_student))
        // Instructors
        .route("/instructors", get(instructors::list_instructors))
        .route("/instructors", post(instructors::create_instructor))
        .route("/instructors/:id", get(instructors::get_instructor))
        .route("/instructors/:id", put(instructors::update_instructor))
        .route("/instructors/:id", delete(instructors::delete_instructor))
        // Vehicles
        .route("/vehicles", get(vehicles::list_vehicles))
        .route("/vehicles", post(vehicles::create_vehicle))
        .route("/vehicles/:id", get(vehicles::get_vehicle))
        .route("/vehicles/:id", put(vehicles::update_vehicle))
        .route("/vehicles/:id", delete(vehicles::delete_vehicle))
        // Lessons
        .route("/lessons", get(lessons::list_lessons))
        .route("/lessons", post(lessons::create_lesson))
        .route("/lessons/:id", get(lessons::get_lesson))
        .route("/lessons/:id", put(lessons::update_lesson))
        .route("/lessons/:id", delete(lessons::delete_lesson))
        // Site profile
        .route("/site/profile", put(site::update_site_profile))
        // User administration
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", delete(users::delete_user))
        .route("/users/:id/roles", post(users::grant_role))
        .route("/users/:id/roles/:role", delete(users::revoke_role))
        // Dashboard stats
        .route("/stats", get(stats::get_dashboard_stats))
        // Audit trail
        .route("/audit-logs", get(audit::list_logs))
        .route("/audit-logs/action-types", get(audit::list_action_types))
        .route("/audit-logs/resource-types", get(audit::list_resource_types))
        // Layered outermost-last: requests hit the rate limiter first,
        // then auth, then the admin role check
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    // Prometheus scrape endpoint, reachable with the admin token or a session
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics::metrics_endpoint))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(metrics_routes)
        .nest("/api/auth", auth_routes)
        .nest(
            "/api",
            public_routes.merge(admin_routes).merge(ws_routes),
        )
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
