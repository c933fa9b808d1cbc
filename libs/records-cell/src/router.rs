use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::RecordService;

pub fn medical_record_routes(service: Arc<RecordService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_records).post(handlers::create_record))
        .route("/{record_id}", get(handlers::get_record))
        .route("/{record_id}/prescriptions", post(handlers::add_prescription))
        .route("/{record_id}/lab-results", post(handlers::add_lab_result))
        .route("/{record_id}/vaccinations", post(handlers::add_vaccination))
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware))
        .with_state(service)
}
