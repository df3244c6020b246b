pub mod health;

pub use health::HealthMonitorService;
