use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Json, Response},
    Extension,
};
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_models::{auth::User, error::AppError};

use crate::{ContentError, CreatePageRequest, MovePageRequest, Page, PageService, UpdatePageRequest};

#[axum::debug_handler]
pub async fn list_pages(
    State(service): State<Arc<PageService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let pages = service.tree(&user).await?;
    Ok(Json(json!({ "total": pages.len(), "pages": pages })))
}

pub async fn create_page(
    State(service): State<Arc<PageService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePageRequest>,
) -> Result<(StatusCode, Json<Page>), AppError> {
    Ok((StatusCode::CREATED, Json(service.create(&user, request).await?)))
}

pub async fn get_page(
    State(service): State<Arc<PageService>>,
    Extension(user): Extension<User>,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Page>, AppError> {
    Ok(Json(service.get(&user, page_id).await?))
}

pub async fn update_page(
    State(service): State<Arc<PageService>>,
    Extension(user): Extension<User>,
    Path(page_id): Path<Uuid>,
    Json(request): Json<UpdatePageRequest>,
) -> Result<Json<Page>, AppError> {
    Ok(Json(service.update(&user, page_id, request).await?))
}

pub async fn delete_page(
    State(service): State<Arc<PageService>>,
    Extension(user): Extension<User>,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let deleted = service.delete(&user, page_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn publish_page(
    State(service): State<Arc<PageService>>,
    Extension(user): Extension<User>,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Page>, AppError> {
    Ok(Json(service.publish(&user, page_id).await?))
}

pub async fn unpublish_page(
    State(service): State<Arc<PageService>>,
    Extension(user): Extension<User>,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Page>, AppError> {
    Ok(Json(service.unpublish(&user, page_id).await?))
}

pub async fn move_page(
    State(service): State<Arc<PageService>>,
    Extension(user): Extension<User>,
    Path(page_id): Path<Uuid>,
    Json(request): Json<MovePageRequest>,
) -> Result<Json<Page>, AppError> {
    Ok(Json(service.move_page(&user, page_id, request).await?))
}

/// Public site. Anything under `/api` that reached here has no route.
pub async fn serve_site(State(service): State<Arc<PageService>>, uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return AppError::NotFound(format!("No API route for {}", path)).into_response();
    }

    match service.render_path(path).await {
        Ok(html) => Html(html).into_response(),
        Err(ContentError::PageNotFound(missing)) => {
            debug!("No live page at {}", missing);
            match service.render_not_found(&missing).await {
                Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
                Err(e) => {
                    error!("Failed to render the not-found page: {}", e);
                    (StatusCode::NOT_FOUND, Html("<h1>Page not found</h1>".to_string())).into_response()
                }
            }
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
