use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
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
    AvailabilityQuery, CreateDoctorRequest, CreateSpecializationRequest, CreateTimeSlotRequest,
    DoctorAvailabilityResponse, DoctorQuery, DoctorService, DoctorView, GenerateSlotsRequest, Specialization,
    TimeSlot, TimeSlotQuery, UpdateDoctorRequest, UpdateTimeSlotRequest,
};

pub async fn list_specializations(State(service): State<Arc<DoctorService>>) -> Json<Value> {
    let specializations = service.list_specializations().await;
    Json(json!({ "total": specializations.len(), "specializations": specializations }))
}

pub async fn create_specialization(
    State(service): State<Arc<DoctorService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSpecializationRequest>,
) -> Result<(StatusCode, Json<Specialization>), AppError> {
    require_role(&user, &[Role::Admin])?;
    Ok((StatusCode::CREATED, Json(service.create_specialization(request).await?)))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(service): State<Arc<DoctorService>>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    debug!("Listing doctors with {:?}", query);
    let doctors = service.list(&query).await?;
    Ok(Json(json!({ "total": doctors.len(), "doctors": doctors })))
}

pub async fn get_doctor(
    State(service): State<Arc<DoctorService>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<DoctorView>, AppError> {
    let doctor = service.get(doctor_id).await?;
    Ok(Json(service.view(doctor).await?))
}

pub async fn get_doctor_availability(
    State(service): State<Arc<DoctorService>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<DoctorAvailabilityResponse>, AppError> {
    Ok(Json(service.doctor_availability(doctor_id, query.date).await?))
}

pub async fn create_doctor(
    State(service): State<Arc<DoctorService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<DoctorView>), AppError> {
    require_role(&user, &[Role::Admin])?;
    let doctor = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(service.view(doctor).await?)))
}

pub async fn update_doctor(
    State(service): State<Arc<DoctorService>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<DoctorView>, AppError> {
    require_role(&user, &[Role::Admin])?;
    let doctor = service.update(doctor_id, request).await?;
    Ok(Json(service.view(doctor).await?))
}

pub async fn delete_doctor(
    State(service): State<Arc<DoctorService>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;
    service.delete(doctor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_time_slots(
    State(service): State<Arc<DoctorService>>,
    Extension(_user): Extension<User>,
    Query(query): Query<TimeSlotQuery>,
) -> Json<Value> {
    let slots = service.list_slots(&query).await;
    Json(json!({ "total": slots.len(), "time_slots": slots }))
}

pub async fn create_time_slot(
    State(service): State<Arc<DoctorService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTimeSlotRequest>,
) -> Result<(StatusCode, Json<TimeSlot>), AppError> {
    Ok((StatusCode::CREATED, Json(service.create_slot(&user, request).await?)))
}

pub async fn generate_time_slots(
    State(service): State<Arc<DoctorService>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let slots = service.generate_slots(&user, request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "total": slots.len(), "time_slots": slots }))))
}

pub async fn get_time_slot(
    State(service): State<Arc<DoctorService>>,
    Extension(_user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<TimeSlot>, AppError> {
    Ok(Json(service.get_slot(slot_id).await?))
}

pub async fn update_time_slot(
    State(service): State<Arc<DoctorService>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<UpdateTimeSlotRequest>,
) -> Result<Json<TimeSlot>, AppError> {
    Ok(Json(service.update_slot(&user, slot_id, request).await?))
}

pub async fn delete_time_slot(
    State(service): State<Arc<DoctorService>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.delete_slot(&user, slot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
