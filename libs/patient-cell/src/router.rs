use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::PatientService;

pub fn patient_routes(service: Arc<PatientService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_patients).post(handlers::create_patient))
        .route(
            "/{patient_id}",
            get(handlers::get_patient)
                .put(handlers::update_patient)
                .delete(handlers::delete_patient),
        )
        .route("/{patient_id}/medical-summary", get(handlers::get_medical_summary))
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware))
        .with_state(service)
}
