use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, doctor_appointment_routes, patient_appointment_routes, AppointmentService};
use auth_cell::{router::auth_routes, AccountService};
use content_cell::{page_routes, site_routes, PageService};
use doctor_cell::{doctor_routes, specialization_routes, time_slot_routes, DoctorService};
use notification_cell::{notification_routes, TaskWorker};
use patient_cell::{patient_routes, PatientService};
use records_cell::{medical_record_routes, RecordService};

pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub doctors: Arc<DoctorService>,
    pub patients: Arc<PatientService>,
    pub appointments: Arc<AppointmentService>,
    pub records: Arc<RecordService>,
    pub pages: Arc<PageService>,
    pub worker: Arc<TaskWorker>,
}

pub fn create_router(services: &AppServices) -> Router {
    let api = Router::new()
        .route("/", get(|| async { "Hospital API is running!" }))
        .nest("/auth", auth_routes(services.accounts.clone()))
        .nest("/specializations", specialization_routes(services.doctors.clone()))
        .nest(
            "/doctors",
            doctor_routes(services.doctors.clone()).merge(doctor_appointment_routes(services.appointments.clone())),
        )
        .nest(
            "/patients",
            patient_routes(services.patients.clone()).merge(patient_appointment_routes(services.appointments.clone())),
        )
        .nest("/time-slots", time_slot_routes(services.doctors.clone()))
        .nest("/appointments", appointment_routes(services.appointments.clone()))
        .nest("/medical-records", medical_record_routes(services.records.clone()))
        .nest("/pages", page_routes(services.pages.clone()))
        .nest(
            "/notifications",
            notification_routes(services.accounts.config().clone(), services.worker.clone()),
        );

    Router::new()
        .nest("/api", api)
        .merge(site_routes(services.pages.clone()))
}
