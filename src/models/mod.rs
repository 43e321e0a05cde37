pub mod booking;
pub mod service;
pub mod slot;
pub mod time_off;

pub use booking::{Booking, BookingStatus, PaymentStatus, DEFAULT_DURATION_MINUTES};
pub use service::Service;
pub use slot::{TimeSlot, CANONICAL_SLOTS};
pub use time_off::{NewTimeOff, TimeOffKind, TimeOffPeriod};
