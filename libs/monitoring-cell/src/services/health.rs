use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{error, info, instrument};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::HealthReport;

pub struct HealthMonitorService {
    supabase_client: SupabaseClient,
}

impl HealthMonitorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase_client: SupabaseClient::new(config),
        }
    }

    #[instrument(skip(self))]
    pub async fn check(&self) -> HealthReport {
        let mut checks = BTreeMap::new();
        checks.insert("database".to_string(), self.check_database().await);
        HealthReport::from_checks(checks)
    }

    async fn check_database(&self) -> String {
        let start = Instant::now();
        match self.supabase_client.ping().await {
            Ok(()) => {
                info!(elapsed_ms = start.elapsed().as_millis() as u64, "database reachable");
                "ok".to_string()
            }
            Err(e) => {
                error!("Database health check failed: {}", e);
                format!("error: {}", e)
            }
        }
    }
}
