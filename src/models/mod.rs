pub mod availability;
pub mod booking;
pub mod conversation;
pub mod record;

pub use availability::BusinessHours;
pub use booking::{Appointment, AppointmentStatus, BookingEvent};
pub use conversation::{Role, Session, SessionStatus, Turn};
pub use record::{BookingRecord, DateToken, Field};
