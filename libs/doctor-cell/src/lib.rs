pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::DoctorError;
pub use models::*;
pub use router::{doctor_routes, specialization_routes, time_slot_routes};
pub use services::*;
