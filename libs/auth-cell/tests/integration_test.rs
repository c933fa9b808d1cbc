use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use auth_cell::{auth_routes, Account, AccountService};
use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_test_service(config: AppConfig) -> Arc<AccountService> {
    Arc::new(AccountService::new(Arc::new(config), Arc::new(Account::table())))
}

fn create_test_app(service: Arc<AccountService>) -> Router {
    auth_routes(service)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn registration(email: &str) -> Value {
    json!({
        "email": email,
        "password": "correct-horse",
        "first_name": "Ada",
        "last_name": "Lovelace"
    })
}

#[tokio::test]
async fn test_register_then_login() {
    let service = create_test_service(TestConfig::default().to_app_config());

    let (status, body) = send(create_test_app(service.clone()), post_json("/register", registration("ada@example.com"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "patient");
    assert_eq!(body["full_name"], "Ada Lovelace");
    assert!(body.get("password_hash").is_none());

    let (status, body) = send(
        create_test_app(service.clone()),
        post_json("/login", json!({ "email": "ADA@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");

    let token = body["access_token"].as_str().unwrap();
    let request = Request::builder()
        .method("GET")
        .uri("/profile")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(create_test_app(service), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@example.com");
}

#[tokio::test]
async fn test_register_duplicate_email_names_field() {
    let service = create_test_service(TestConfig::default().to_app_config());
    send(create_test_app(service.clone()), post_json("/register", registration("ada@example.com"))).await;

    let (status, body) = send(create_test_app(service), post_json("/register", registration("ada@example.com"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "email");
}

#[tokio::test]
async fn test_login_wrong_password_unauthorized() {
    let service = create_test_service(TestConfig::default().to_app_config());
    send(create_test_app(service.clone()), post_json("/register", registration("ada@example.com"))).await;

    let (status, _) = send(
        create_test_app(service),
        post_json("/login", json!({ "email": "ada@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_validate_token_endpoint() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let app = create_test_app(create_test_service(config));

    let request = Request::builder()
        .method("POST")
        .uri("/validate")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["user_id"], user.id.to_string());
    assert_eq!(body["role"], "doctor");
}

#[tokio::test]
async fn test_verify_reports_invalid_token() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);
    let app = create_test_app(create_test_service(config));

    let request = Request::builder()
        .method("POST")
        .uri("/verify")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_user_management_is_admin_only() {
    let config = TestConfig::default().to_app_config();
    let service = create_test_service(config.clone());

    let staff = TestUser::staff("staff@example.com");
    let mut request = post_json("/users", json!({
        "email": "doc@example.com",
        "password": "doctor-pass",
        "first_name": "Gregory",
        "last_name": "House",
        "role": "doctor"
    }));
    request.headers_mut().insert(
        "authorization",
        JwtTestUtils::bearer(&staff, &config.jwt_secret).parse().unwrap(),
    );
    let (status, _) = send(create_test_app(service.clone()), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = TestUser::admin("admin@example.com");
    let mut request = post_json("/users", json!({
        "email": "doc@example.com",
        "password": "doctor-pass",
        "first_name": "Gregory",
        "last_name": "House",
        "role": "doctor"
    }));
    request.headers_mut().insert(
        "authorization",
        JwtTestUtils::bearer(&admin, &config.jwt_secret).parse().unwrap(),
    );
    let (status, body) = send(create_test_app(service.clone()), request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "doctor");

    let doctor_id = body["id"].as_str().unwrap().to_string();
    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/users/{}/deactivate", doctor_id))
        .header("authorization", JwtTestUtils::bearer(&admin, &config.jwt_secret))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(create_test_app(service.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let request = Request::builder()
        .uri("/users?role=doctor")
        .header("authorization", JwtTestUtils::bearer(&admin, &config.jwt_secret))
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(create_test_app(service), request).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_bootstrap_admin_created_once() {
    let config = AppConfig {
        admin_email: Some("root@example.com".to_string()),
        admin_password: Some("bootstrap-pass".to_string()),
        ..TestConfig::default().to_app_config()
    };
    let service = create_test_service(config);

    let created = service.ensure_admin().await.unwrap().unwrap();
    assert_eq!(created.role, Role::Admin);
    assert!(service.ensure_admin().await.unwrap().is_none());
}
