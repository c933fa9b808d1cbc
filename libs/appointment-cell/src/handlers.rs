use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::{
    auth::{Role, User},
    error::AppError,
};
use shared_utils::extractor::require_role;

use crate::{
    Appointment, AppointmentQuery, AppointmentService, AppointmentView, AvailableSlotsQuery,
    CancelAppointmentRequest, CalendarQuery, CompleteAppointmentRequest, CreateAppointmentRequest,
    RescheduleAppointmentRequest, UpdateAppointmentRequest,
};

fn listing(appointments: Vec<AppointmentView>) -> Json<Value> {
    Json(json!({ "total": appointments.len(), "appointments": appointments }))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    debug!("Listing appointments for {} with {:?}", user.id, query);
    Ok(listing(service.list(&user, &query).await?))
}

pub async fn create_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentView>), AppError> {
    let appointment = service.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(service.view(appointment).await?)))
}

pub async fn get_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentView>, AppError> {
    let appointment = service.get_for(&user, appointment_id).await?;
    Ok(Json(service.view(appointment).await?))
}

pub async fn update_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<AppointmentView>, AppError> {
    let appointment = service.update(&user, appointment_id, request).await?;
    Ok(Json(service.view(appointment).await?))
}

pub async fn delete_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;
    service.delete(appointment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.cancel(&user, appointment_id, request).await?))
}

pub async fn complete_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.complete(&user, appointment_id, request).await?))
}

pub async fn reschedule_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.reschedule(&user, appointment_id, request).await?))
}

pub async fn confirm_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.confirm(&user, appointment_id).await?))
}

pub async fn start_appointment(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.start(&user, appointment_id).await?))
}

pub async fn upcoming_appointments(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    Ok(listing(service.upcoming(&user).await?))
}

pub async fn available_slots(
    State(service): State<Arc<AppointmentService>>,
    Extension(_user): Extension<User>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = service.available_slots(&query).await?;
    Ok(Json(json!({ "total": slots.len(), "time_slots": slots })))
}

pub async fn export_csv(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Response, AppError> {
    let csv = service.export_csv(&user, &query).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"appointments.csv\""),
        ],
        csv,
    )
        .into_response())
}

pub async fn calendar(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Value>, AppError> {
    let events = service.calendar(&user, &query).await?;
    Ok(Json(json!({ "total": events.len(), "events": events })))
}

pub async fn doctor_appointments(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    Ok(listing(service.for_doctor(&user, doctor_id).await?))
}

pub async fn patient_appointments(
    State(service): State<Arc<AppointmentService>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    Ok(listing(service.for_patient(&user, patient_id).await?))
}
