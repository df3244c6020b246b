pub mod profile;
pub mod rooms;

pub use profile::StaffService;
pub use rooms::RoomService;
