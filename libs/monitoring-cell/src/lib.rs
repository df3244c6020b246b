// =====================================================================================
// MONITORING CELL - SERVICE HEALTH
// =====================================================================================
//
// Liveness and dependency checks for load balancers and uptime monitors.
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{HealthReport, HealthStatus};
pub use router::monitoring_routes;
pub use services::HealthMonitorService;
