//! Session-security core for a hospital administration backend.
//!
//! The business CRUD modules live elsewhere; this crate owns session
//! lifecycle, CSRF, PII field encryption, password hashing, login rate
//! limiting, audit events, and the permission lookup they all consult.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use http::{header, Method};
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub mod crypto {
    pub mod cipher;
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod audit;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod audit;
    pub mod counter;
    pub mod memory;
    pub mod session;
    pub mod user;
}

pub mod services {
    pub mod audit;
    pub mod auth;
    pub mod csrf_guard;
    pub mod permissions;
    pub mod rate_limiter;
    pub mod session_guard;
}

pub mod handlers {
    pub mod audit;
    pub mod auth;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod csrf;
    pub mod headers;
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
}

use state::AppState;

/// Builds the full router: login (rate-limited), protected session/permission
/// routes (session guard + CSRF + no-store), hardening headers everywhere.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:3000".parse().unwrap(),
            "http://127.0.0.1:3000".parse().unwrap(),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::COOKIE,
            "x-csrf-token".parse().unwrap(),
        ])
        .allow_credentials(true)
        .expose_headers(["x-csrf-token".parse().unwrap()])
        .max_age(Duration::from_secs(86400));

    let protected_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(50)
            .burst_size(100)
            .use_headers()
            .finish()
            .unwrap(),
    );

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_login,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/session", get(handlers::auth::session_info))
        .route(
            "/api/permissions/{module}/{action}",
            get(handlers::auth::check_permission),
        )
        .route("/api/audit/events", get(handlers::audit::list_events))
        .layer(tower_governor::GovernorLayer::new(protected_governor_conf))
        .route_layer(from_fn(middleware_layer::headers::no_store))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::csrf::verify_csrf,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(login_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(from_fn(middleware_layer::headers::security_headers))
        .layer(CookieManagerLayer::new())
        .layer(cors)
}
