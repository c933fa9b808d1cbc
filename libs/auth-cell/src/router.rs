use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::AccountService;

pub fn auth_routes(service: Arc<AccountService>) -> Router {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/validate", post(handlers::validate))
        .route("/verify", post(handlers::verify));

    let protected_routes = Router::new()
        .route("/profile", get(handlers::profile))
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route("/users/{id}/deactivate", patch(handlers::deactivate_user))
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(service)
}
