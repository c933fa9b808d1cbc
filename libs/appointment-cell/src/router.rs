use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::AppointmentService;

pub fn appointment_routes(service: Arc<AppointmentService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::create_appointment))
        .route("/upcoming", get(handlers::upcoming_appointments))
        .route("/available-slots", get(handlers::available_slots))
        .route("/export-csv", get(handlers::export_csv))
        .route("/calendar", get(handlers::calendar))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/start", post(handlers::start_appointment))
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware))
        .with_state(service)
}

/// Mounted next to the doctor routes: `/{doctor_id}/appointments`.
pub fn doctor_appointment_routes(service: Arc<AppointmentService>) -> Router {
    Router::new()
        .route("/{doctor_id}/appointments", get(handlers::doctor_appointments))
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware))
        .with_state(service)
}

/// Mounted next to the patient routes: `/{patient_id}/appointments`.
pub fn patient_appointment_routes(service: Arc<AppointmentService>) -> Router {
    Router::new()
        .route("/{patient_id}/appointments", get(handlers::patient_appointments))
        .layer(middleware::from_fn_with_state(service.config().clone(), auth_middleware))
        .with_state(service)
}
