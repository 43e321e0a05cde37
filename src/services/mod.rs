pub mod availability;
pub mod bookings;
pub mod catalog;
pub mod clock;
pub mod payments;
pub mod scheduling;
pub mod status;
pub mod time;
pub mod time_off;
