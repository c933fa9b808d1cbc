pub mod patient;

pub use patient::{PatientAppointments, PatientService};
