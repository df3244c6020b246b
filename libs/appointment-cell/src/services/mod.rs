pub mod booking;
pub mod lifecycle;
pub mod listing;
pub(crate) mod store;
pub mod token;

pub use booking::BookingService;
pub use lifecycle::AppointmentLifecycle;
pub use listing::{ListingService, StaffContext};
