use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::jwt::validate_token;

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    match auth_value.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(AppError::Auth("Invalid authorization header format".to_string())),
    }
}

/// Validates the bearer token and stores the caller as a [`User`] extension.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;

    let user = validate_token(&token, &config.jwt_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn require_role(user: &User, roles: &[Role]) -> Result<(), AppError> {
    if user.has_role(roles) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role {} is not permitted to perform this action",
            user.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::{
        http::{HeaderValue, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::test_utils::{JwtTestUtils, TestConfig, TestUser};

    fn app() -> Router {
        let config = TestConfig::default().to_arc();
        Router::new()
            .route(
                "/",
                get(|Extension(user): Extension<User>| async move { format!("{} {}", user.role, user.id) }),
            )
            .layer(middleware::from_fn_with_state(config, auth_middleware))
    }

    async fn call(authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        let response = app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_matches!(extract_bearer_token(&headers), Err(AppError::Auth(_)));

        headers.insert("Authorization", HeaderValue::from_static("Token abc"));
        assert_matches!(extract_bearer_token(&headers), Err(AppError::Auth(_)));

        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_matches!(extract_bearer_token(&headers), Err(AppError::Auth(_)));

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc");
    }

    #[tokio::test]
    async fn middleware_rejects_missing_or_malformed_headers() {
        assert_eq!(call(None).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(call(Some("Token abc")).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(call(Some("Bearer not-a-jwt")).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn middleware_rejects_tokens_signed_with_another_secret() {
        let user = TestUser::doctor("doc@example.com");
        let token = JwtTestUtils::bearer(&user, "some-other-secret-that-is-long-enough-to-sign");
        assert_eq!(call(Some(&token)).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn middleware_inserts_the_caller() {
        let user = TestUser::doctor("doc@example.com");
        let token = JwtTestUtils::bearer(&user, &TestConfig::default().jwt_secret);

        let (status, body) = call(Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{} {}", Role::Doctor, user.id));
    }

    #[test]
    fn require_role_forbids_other_roles() {
        let user = User {
            id: Uuid::new_v4(),
            email: None,
            role: Role::Patient,
            created_at: None,
        };
        assert!(require_role(&user, &[Role::Patient]).is_ok());
        assert!(matches!(
            require_role(&user, &[Role::Admin, Role::Staff]),
            Err(AppError::Forbidden(_))
        ));
    }
}
