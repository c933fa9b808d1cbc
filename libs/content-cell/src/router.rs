use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::PageService;

/// Page tree administration, mounted under `/api/pages`.
pub fn page_routes(service: Arc<PageService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_pages).post(handlers::create_page))
        .route(
            "/{page_id}",
            get(handlers::get_page)
                .put(handlers::update_page)
                .delete(handlers::delete_page),
        )
        .route("/{page_id}/publish", post(handlers::publish_page))
        .route("/{page_id}/unpublish", post(handlers::unpublish_page))
        .route("/{page_id}/move", post(handlers::move_page))
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware))
        .with_state(service)
}

/// The public website as a fallback for every path without an API route.
pub fn site_routes(service: Arc<PageService>) -> Router {
    Router::new().fallback(handlers::serve_site).with_state(service)
}
