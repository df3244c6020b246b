pub mod guards;
pub mod handlers;
pub mod router;
pub mod services;
