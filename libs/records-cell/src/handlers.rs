use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::{auth::User, error::AppError};

use crate::{
    AddLabResultRequest, AddPrescriptionRequest, AddVaccinationRequest, CreateRecordRequest, LabResult,
    MedicalRecordView, Prescription, RecordQuery, RecordService, Vaccination,
};

pub async fn list_records(
    State(service): State<Arc<RecordService>>,
    Extension(user): Extension<User>,
    Query(query): Query<RecordQuery>,
) -> Json<Value> {
    let records = service.list(&user, &query).await;
    Json(json!({ "total": records.len(), "medical_records": records }))
}

pub async fn create_record(
    State(service): State<Arc<RecordService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<MedicalRecordView>), AppError> {
    let record = service.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(service.view(record).await)))
}

pub async fn get_record(
    State(service): State<Arc<RecordService>>,
    Extension(user): Extension<User>,
    Path(record_id): Path<Uuid>,
) -> Result<Json<MedicalRecordView>, AppError> {
    let record = service.get_for(&user, record_id).await?;
    Ok(Json(service.view(record).await))
}

pub async fn add_prescription(
    State(service): State<Arc<RecordService>>,
    Extension(user): Extension<User>,
    Path(record_id): Path<Uuid>,
    Json(request): Json<AddPrescriptionRequest>,
) -> Result<(StatusCode, Json<Prescription>), AppError> {
    Ok((StatusCode::CREATED, Json(service.add_prescription(&user, record_id, request).await?)))
}

pub async fn add_lab_result(
    State(service): State<Arc<RecordService>>,
    Extension(user): Extension<User>,
    Path(record_id): Path<Uuid>,
    Json(request): Json<AddLabResultRequest>,
) -> Result<(StatusCode, Json<LabResult>), AppError> {
    Ok((StatusCode::CREATED, Json(service.add_lab_result(&user, record_id, request).await?)))
}

pub async fn add_vaccination(
    State(service): State<Arc<RecordService>>,
    Extension(user): Extension<User>,
    Path(record_id): Path<Uuid>,
    Json(request): Json<AddVaccinationRequest>,
) -> Result<(StatusCode, Json<Vaccination>), AppError> {
    Ok((StatusCode::CREATED, Json(service.add_vaccination(&user, record_id, request).await?)))
}
