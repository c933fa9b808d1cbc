use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::TaskWorker;

pub fn notification_routes(config: Arc<AppConfig>, worker: Arc<TaskWorker>) -> Router {
    Router::new()
        .route("/queue/stats", get(handlers::queue_stats))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(worker)
}
