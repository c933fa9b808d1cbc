use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::DoctorService;

pub fn specialization_routes(service: Arc<DoctorService>) -> Router {
    let public_routes = Router::new().route("/", get(handlers::list_specializations));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_specialization))
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(service)
}

pub fn doctor_routes(service: Arc<DoctorService>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route(
            "/{doctor_id}",
            axum::routing::put(handlers::update_doctor).delete(handlers::delete_doctor),
        )
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(service)
}

pub fn time_slot_routes(service: Arc<DoctorService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_time_slots).post(handlers::create_time_slot))
        .route("/generate", post(handlers::generate_time_slots))
        .route(
            "/{slot_id}",
            get(handlers::get_time_slot)
                .put(handlers::update_time_slot)
                .delete(handlers::delete_time_slot),
        )
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware))
        .with_state(service)
}
