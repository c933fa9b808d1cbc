pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::PatientError;
pub use models::*;
pub use router::patient_routes;
pub use services::{PatientAppointments, PatientService};
