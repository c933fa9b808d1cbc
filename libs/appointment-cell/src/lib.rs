pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::AppointmentError;
pub use models::*;
pub use router::{appointment_routes, doctor_appointment_routes, patient_appointment_routes};
pub use services::*;
