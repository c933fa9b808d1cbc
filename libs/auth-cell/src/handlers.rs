use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{Role, TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::{extract_bearer_token, require_role};
use shared_utils::jwt::validate_token;

use crate::{AccountProfile, AccountQuery, AccountService, CreateAccountRequest, LoginRequest, LoginResponse, RegisterRequest};

#[axum::debug_handler]
pub async fn register(
    State(service): State<Arc<AccountService>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountProfile>), AppError> {
    let account = service.register(request).await?;
    Ok((StatusCode::CREATED, Json(account.profile())))
}

#[axum::debug_handler]
pub async fn login(
    State(service): State<Arc<AccountService>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(service.login(&request.email, &request.password).await?))
}

pub async fn validate(
    State(service): State<Arc<AccountService>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = validate_token(&token, &service.config().jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify(
    State(service): State<Arc<AccountService>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;
    let valid = validate_token(&token, &service.config().jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

pub async fn profile(
    State(service): State<Arc<AccountService>>,
    Extension(user): Extension<User>,
) -> Result<Json<AccountProfile>, AppError> {
    debug!("Getting profile for user: {}", user.id);
    Ok(Json(service.get(user.id).await?.profile()))
}

pub async fn list_users(
    State(service): State<Arc<AccountService>>,
    Extension(user): Extension<User>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let users: Vec<AccountProfile> = service.list(&query).await.iter().map(|a| a.profile()).collect();
    Ok(Json(json!({ "total": users.len(), "users": users })))
}

pub async fn create_user(
    State(service): State<Arc<AccountService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountProfile>), AppError> {
    require_role(&user, &[Role::Admin])?;

    let account = service.create(request.details, request.role).await?;
    Ok((StatusCode::CREATED, Json(account.profile())))
}

pub async fn deactivate_user(
    State(service): State<Arc<AccountService>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountProfile>, AppError> {
    require_role(&user, &[Role::Admin])?;

    if id == user.id {
        return Err(AppError::BadRequest("You cannot deactivate your own account".to_string()));
    }

    Ok(Json(service.deactivate(id).await?.profile()))
}
