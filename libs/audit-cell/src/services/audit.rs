use reqwest::Method;
use serde_json::Value;
use tracing::{info, instrument, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AuditAction, AuditEntry, AuditError, NewAuditEntry};

/// Write path of the audit log: every entry goes to `tracing` and to `audit_logs`.
pub struct AuditService {
    supabase: SupabaseClient,
}

impl AuditService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    #[instrument(
        skip(self, entry, auth_token),
        fields(action = entry.action.as_str(), module = entry.module.as_str())
    )]
    pub async fn record(
        &self,
        entry: NewAuditEntry,
        auth_token: &str,
    ) -> Result<AuditEntry, AuditError> {
        self.log_to_tracing(&entry);

        let body = serde_json::to_value(&entry).map_err(|e| {
            AuditError::DatabaseError(format!("Failed to serialize audit entry: {}", e))
        })?;

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/audit_logs",
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| AuditError::DatabaseError(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AuditError::DatabaseError("Audit insert returned no rows".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| AuditError::DatabaseError(format!("Failed to parse audit entry: {}", e)))
    }

    /// Records an entry without letting an audit outage fail the business operation.
    pub async fn record_best_effort(&self, entry: NewAuditEntry, auth_token: &str) {
        let description = entry.description.clone();
        if let Err(e) = self.record(entry, auth_token).await {
            warn!(error = %e, "audit entry could not be persisted: {}", description);
        }
    }

    fn log_to_tracing(&self, entry: &NewAuditEntry) {
        match entry.action {
            AuditAction::AccessDenied => warn!(
                actor_id = ?entry.actor_id,
                module = entry.module.as_str(),
                object_type = ?entry.object_type,
                object_id = ?entry.object_id,
                ip_address = ?entry.ip_address,
                "AUDIT DENIED: {}", entry.description
            ),
            _ => info!(
                actor_id = ?entry.actor_id,
                actor_name = ?entry.actor_name,
                action = entry.action.as_str(),
                module = entry.module.as_str(),
                object_type = ?entry.object_type,
                object_id = ?entry.object_id,
                "AUDIT: {}", entry.description
            ),
        }
    }
}
