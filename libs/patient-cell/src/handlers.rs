use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::{
    auth::{Role, User},
    error::AppError,
};
use shared_utils::extractor::require_role;

use crate::{CreatePatientRequest, MedicalSummary, PatientQuery, PatientService, PatientView, UpdatePatientRequest};

#[axum::debug_handler]
pub async fn list_patients(
    State(service): State<Arc<PatientService>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Value>, AppError> {
    let patients = service.list(&user, &query).await?;
    Ok(Json(json!({ "total": patients.len(), "patients": patients })))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(service): State<Arc<PatientService>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<PatientView>), AppError> {
    let patient = service.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(service.view(patient).await?)))
}

pub async fn get_patient(
    State(service): State<Arc<PatientService>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<PatientView>, AppError> {
    let patient = service.get_for(&user, patient_id).await?;
    Ok(Json(service.view(patient).await?))
}

pub async fn update_patient(
    State(service): State<Arc<PatientService>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<PatientView>, AppError> {
    let patient = service.update(&user, patient_id, request).await?;
    Ok(Json(service.view(patient).await?))
}

pub async fn delete_patient(
    State(service): State<Arc<PatientService>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&user, &[Role::Admin])?;
    service.delete(patient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_medical_summary(
    State(service): State<Arc<PatientService>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<MedicalSummary>, AppError> {
    Ok(Json(service.medical_summary(&user, patient_id).await?))
}
