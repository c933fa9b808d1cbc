pub mod booking;
pub mod bookings;
pub mod export;
pub mod lifecycle;
pub mod notifier;
pub mod queries;
pub mod sweeps;

pub use booking::{AppointmentService, Participants};
pub use bookings::AppointmentBookings;
pub use lifecycle::AppointmentLifecycleService;
pub use notifier::AppointmentNotifier;
pub use sweeps::{NoShowSweep, ReminderSweep};
