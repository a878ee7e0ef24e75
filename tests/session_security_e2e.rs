//! End-to-end exercises of the security router over in-memory stores.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use zeroize::Zeroizing;

use wardlock::config::Config;
use wardlock::crypto::password::hash_password;
use wardlock::middleware_layer::csrf::verify_csrf;
use wardlock::models::audit::{AuditAction, AuditOutcome, Severity};
use wardlock::models::session::{RequestContext, Session};
use wardlock::models::user::User;
use wardlock::services::session_guard::Authenticated;
use wardlock::repositories::memory::{
    MemoryAuditSink, MemoryCounterStore, MemorySessionStore, MemoryUserStore,
};
use wardlock::repositories::user::UserStore;
use wardlock::state::AppState;
use wardlock::build_router;

const IP_A: [u8; 4] = [10, 0, 0, 1];
const IP_B: [u8; 4] = [192, 0, 2, 66];
const UA: &str = "ward-terminal/1.0";

struct TestApp {
    router: axum::Router,
    sink: Arc<MemoryAuditSink>,
    users: Arc<MemoryUserStore>,
}

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        redis_url: String::new(),
        bind_addr: "127.0.0.1:0".to_string(),
        encryption_key: Zeroizing::new(vec![7u8; 32]),
        cipher: "aes-256-gcm".to_string(),
        session_timeout_secs: 1440,
        session_rotation_secs: 1800,
        csrf_ttl_secs: 3600,
        max_login_attempts: 5,
        login_rate_limit: 3,
        login_rate_window_secs: 900,
        fail_open_on_store_error: true,
    }
}

fn staff_user(username: &str, name: &str, role: &str, password: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        password_hash: hash_password(password).unwrap(),
        password_salt: None,
        failed_attempts: 0,
        locked_at: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

fn test_app() -> TestApp {
    let users = Arc::new(MemoryUserStore::new());
    users.insert(staff_user("dr.osei", "Kwame Osei", "doctor", "Stethoscope-42"));
    users.insert(staff_user("admin", "Site Admin", "admin", "Root-Access-9"));

    let sink = Arc::new(MemoryAuditSink::new());
    let state = AppState::with_stores(
        test_config(),
        users.clone(),
        Arc::new(MemorySessionStore::new()),
        sink.clone(),
        Arc::new(MemoryCounterStore::new()),
    )
    .unwrap();

    TestApp { router: build_router(state), sink, users }
}

fn request(method: &str, uri: &str, ip: [u8; 4], body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("user-agent", UA);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let mut req = builder
        .body(match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    req
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session_id="))
        .expect("session cookie set")
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn login_as(app: &TestApp, username: &str, password: &str) -> (String, String) {
    let response = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/login",
            IP_A,
            Some(json!({"username": username, "password": password})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = session_cookie(&response);
    let body = body_json(response).await;
    let csrf = body["csrf_token"].as_str().unwrap().to_string();
    (cookie, csrf)
}

/// Logs in as dr.osei and returns (cookie, csrf_token).
async fn login(app: &TestApp) -> (String, String) {
    login_as(app, "dr.osei", "Stethoscope-42").await
}

#[tokio::test]
async fn login_sets_hardened_cookie_and_issues_csrf() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/login",
            IP_A,
            Some(json!({"username": "dr.osei", "password": "Stethoscope-42"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("session_id="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));

    // Hardening headers ride on every response.
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["csrf_token"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let app = test_app();

    let wrong_password = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/login",
            IP_A,
            Some(json!({"username": "dr.osei", "password": "wrong"})),
        ))
        .await
        .unwrap();
    let unknown_user = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/login",
            IP_A,
            Some(json!({"username": "dr.nobody", "password": "wrong"})),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_user).await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn protected_route_requires_session() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/api/auth/session", IP_A, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn session_endpoint_returns_identity_and_no_store() {
    let app = test_app();
    let (cookie, csrf) = login(&app).await;

    let mut req = request("GET", "/api/auth/session", IP_A, None);
    req.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["cache-control"]
        .to_str()
        .unwrap()
        .contains("no-store"));

    let body = body_json(response).await;
    assert_eq!(body["username"], json!("dr.osei"));
    assert_eq!(body["role"], json!("doctor"));
    // Issuance is idempotent inside the window.
    assert_eq!(body["csrf_token"].as_str().unwrap(), csrf);
}

#[tokio::test]
async fn stolen_cookie_from_other_ip_is_revoked_and_audited() {
    let app = test_app();
    let (cookie, _) = login(&app).await;

    let mut req = request("GET", "/api/auth/session", IP_B, None);
    req.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let events = app.sink.events();
    assert!(events.iter().any(|e| e.action == AuditAction::Login
        && e.outcome == AuditOutcome::Blocked
        && e.severity == Severity::Critical
        && e.ip_address == "192.0.2.66"));

    // The session is destroyed: the original client is logged out too.
    let mut retry = request("GET", "/api/auth/session", IP_A, None);
    retry.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(retry).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_without_csrf_token_is_blocked_and_audited() {
    let app = test_app();
    let (cookie, _) = login(&app).await;

    let mut req = request("POST", "/api/auth/logout", IP_A, None);
    req.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let events = app.sink.events();
    assert!(events.iter().any(|e| e.action == AuditAction::CsrfAttack
        && e.severity == Severity::Critical));
}

#[tokio::test]
async fn logout_with_csrf_header_destroys_session() {
    let app = test_app();
    let (cookie, csrf) = login(&app).await;

    let mut req = request("POST", "/api/auth/logout", IP_A, None);
    req.headers_mut().insert("cookie", cookie.parse().unwrap());
    req.headers_mut().insert("x-csrf-token", csrf.parse().unwrap());
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Cookie no longer resolves.
    let mut retry = request("GET", "/api/auth/session", IP_A, None);
    retry.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(retry).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn csrf_token_in_json_body_is_accepted() {
    let app = test_app();
    let (cookie, csrf) = login(&app).await;

    let mut req = request(
        "POST",
        "/api/auth/logout",
        IP_A,
        Some(json!({"csrf_token": csrf})),
    );
    req.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_rate_limit_denies_fourth_attempt() {
    let app = test_app();

    for _ in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(request(
                "POST",
                "/api/auth/login",
                IP_A,
                Some(json!({"username": "dr.osei", "password": "nope"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .router
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/login",
            IP_A,
            Some(json!({"username": "dr.osei", "password": "Stethoscope-42"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let events = app.sink.events();
    assert!(events.iter().any(|e| e.action == AuditAction::RateLimited));
}

#[tokio::test]
async fn permission_lookup_reflects_role_table() {
    let app = test_app();
    let (cookie, _) = login(&app).await;

    let mut allowed = request("GET", "/api/permissions/appointments/delete", IP_A, None);
    allowed.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(allowed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["allowed"], json!(true));

    let mut denied = request("GET", "/api/permissions/audit/view", IP_A, None);
    denied.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(denied).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["allowed"], json!(false));

    // The denied lookup leaves a trace.
    let events = app.sink.events();
    assert!(events.iter().any(|e| e.action == AuditAction::PermissionDenied
        && e.outcome == AuditOutcome::Blocked
        && e.resource_id.as_deref() == Some("audit/view")));
}

#[tokio::test]
async fn audit_trail_is_denied_and_audited_for_non_admins() {
    let app = test_app();
    let (cookie, _) = login(&app).await;

    let mut req = request("GET", "/api/audit/events", IP_A, None);
    req.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let events = app.sink.events();
    assert!(events.iter().any(|e| e.action == AuditAction::PermissionDenied
        && e.outcome == AuditOutcome::Blocked
        && e.severity == Severity::Warning));
}

#[tokio::test]
async fn admin_reads_recent_audit_events() {
    let app = test_app();
    let (cookie, _) = login_as(&app, "admin", "Root-Access-9").await;

    let mut req = request("GET", "/api/audit/events", IP_A, None);
    req.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The admin's own login is already on record.
    let body = body_json(response).await;
    let events = body.as_array().unwrap();
    assert!(events.iter().any(|e| e["action"] == json!("Login")));
}

#[tokio::test]
async fn csrf_store_outage_fails_closed_at_warning_severity() {
    let sessions = Arc::new(MemorySessionStore::new());
    let sink = Arc::new(MemoryAuditSink::new());
    let state = AppState::with_stores(
        test_config(),
        Arc::new(MemoryUserStore::new()),
        sessions.clone(),
        sink.clone(),
        Arc::new(MemoryCounterStore::new()),
    )
    .unwrap();

    let router = Router::new()
        .route("/api/ward/notes", post(|| async { "ok" }))
        .route_layer(from_fn_with_state(state, verify_csrf));

    let now = Utc::now();
    let auth = Authenticated {
        session_id: Uuid::new_v4(),
        session: Session {
            user_id: Uuid::new_v4(),
            username: "dr.osei".to_string(),
            role: "doctor".to_string(),
            bound_ip: "10.0.0.1".to_string(),
            bound_user_agent: UA.to_string(),
            created_at: now,
            last_activity_at: now,
            csrf: None,
        },
        rotated: false,
    };

    sessions.set_failing(true);

    let mut req = request("POST", "/api/ward/notes", IP_A, None);
    req.headers_mut()
        .insert("x-csrf-token", "deadbeef".parse().unwrap());
    req.extensions_mut().insert(auth);
    req.extensions_mut()
        .insert(RequestContext::new("10.0.0.1".to_string(), UA.to_string()));

    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Denied, but recorded as an availability problem, not an attack.
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::CsrfAttack);
    assert_eq!(events[0].severity, Severity::Warning);
    assert!(events[0]
        .details
        .as_deref()
        .unwrap()
        .contains("verification unavailable"));
}

#[tokio::test]
async fn mid_session_lock_rejects_next_request() {
    let app = test_app();
    let (cookie, _) = login(&app).await;

    let user = app.users.find_by_username("dr.osei").await.unwrap().unwrap();
    app.users.lock_account(&user.id, Utc::now()).await.unwrap();

    let mut req = request("GET", "/api/auth/session", IP_A, None);
    req.headers_mut().insert("cookie", cookie.parse().unwrap());
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
