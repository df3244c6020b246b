use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::Actor;
use shared_utils::clock::query_timestamp;

use crate::models::{
    AuditAction, AuditError, AuditModule, ClearAuditRequest, ClearOutcome, NewAuditEntry,
    PurgeReport, PurgeRequest,
};
use crate::services::audit::AuditService;

const TABLE: &str = "/rest/v1/audit_logs";

#[derive(Debug, Deserialize)]
struct TimestampRow {
    occurred_at: DateTime<Utc>,
}

pub struct AuditRetentionService {
    supabase: SupabaseClient,
    audit: AuditService,
}

impl AuditRetentionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            audit: AuditService::new(config),
        }
    }

    fn db(e: anyhow::Error) -> AuditError {
        AuditError::DatabaseError(e.to_string())
    }

    async fn count_older_than(
        &self,
        cutoff: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<u64, AuditError> {
        let path = format!("{}?occurred_at=lt.{}", TABLE, query_timestamp(cutoff));
        self.supabase.count(&path, Some(auth_token)).await.map_err(Self::db)
    }

    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), AuditError> {
        let path = format!("{}?occurred_at=lt.{}", TABLE, query_timestamp(cutoff));
        self.supabase.delete(&path, Some(auth_token)).await.map_err(Self::db)
    }

    /// Timestamp of the `keep`-th newest entry; everything older is over the limit.
    async fn limit_cutoff(
        &self,
        keep: u64,
        auth_token: &str,
    ) -> Result<Option<DateTime<Utc>>, AuditError> {
        let path = format!(
            "{}?select=occurred_at&order=occurred_at.desc&limit=1&offset={}",
            TABLE,
            keep.saturating_sub(1)
        );
        let rows: Vec<TimestampRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;
        Ok(rows.into_iter().next().map(|row| row.occurred_at))
    }

    /// Deletes the whole log, then records the wipe as the first new entry.
    #[instrument(skip(self, actor, auth_token))]
    pub async fn clear_all(
        &self,
        request: &ClearAuditRequest,
        actor: &Actor,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<ClearOutcome, AuditError> {
        if !request.confirmar || !request.eliminar_todo {
            return Err(AuditError::ConfirmationRequired);
        }

        let total_before = self.supabase.count(TABLE, Some(auth_token)).await.map_err(Self::db)?;

        if total_before == 0 {
            return Ok(ClearOutcome {
                message: "No hay registros de auditoría para eliminar.".to_string(),
                total_antes: 0,
                total_despues: 0,
                eliminados: 0,
            });
        }

        // PostgREST refuses unfiltered deletes.
        self.supabase
            .delete(&format!("{}?id=not.is.null", TABLE), Some(auth_token))
            .await
            .map_err(Self::db)?;

        warn!(total_before, "audit log wiped");

        let actor_name = actor.display_name().unwrap_or_else(|| "desconocido".to_string());
        let entry = NewAuditEntry::new(
            AuditAction::Delete,
            AuditModule::Audit,
            format!(
                "Se eliminaron todos los registros de auditoría ({} registros eliminados)",
                total_before
            ),
        )
        .with_actor(actor)
        .with_details(format!(
            "Limpieza completa del historial de auditoría realizada por {}",
            actor_name
        ))
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(ClearOutcome {
            message: format!(
                "Se eliminaron todos los registros de auditoría ({} registros eliminados).",
                total_before
            ),
            total_antes: total_before,
            total_despues: 0,
            eliminados: total_before,
        })
    }

    /// Keeps at most `max_registros` entries and nothing older than `dias` days.
    #[instrument(skip(self, auth_token))]
    pub async fn purge(
        &self,
        request: &PurgeRequest,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<PurgeReport, AuditError> {
        if request.dias < PurgeRequest::MIN_DAYS {
            return Err(AuditError::RetentionTooShort(PurgeRequest::MIN_DAYS));
        }
        if request.max_registros < PurgeRequest::MIN_RECORDS {
            return Err(AuditError::RecordLimitTooLow(PurgeRequest::MIN_RECORDS));
        }

        let total_before = self.supabase.count(TABLE, Some(auth_token)).await.map_err(Self::db)?;

        let mut removed_by_limit = 0;
        if total_before > request.max_registros {
            if let Some(cutoff) = self.limit_cutoff(request.max_registros, auth_token).await? {
                removed_by_limit = self.count_older_than(cutoff, auth_token).await?;
                if !request.dry_run && removed_by_limit > 0 {
                    self.delete_older_than(cutoff, auth_token).await?;
                    info!(
                        removed_by_limit,
                        max = request.max_registros,
                        "audit entries over the limit deleted"
                    );
                }
            }
        }

        let age_cutoff = now - Duration::days(request.dias);
        let removed_by_age = self.count_older_than(age_cutoff, auth_token).await?;
        if !request.dry_run && removed_by_age > 0 {
            self.delete_older_than(age_cutoff, auth_token).await?;
            info!(removed_by_age, days = request.dias, "audit entries past retention deleted");
        }

        let total_after = if request.dry_run {
            total_before.saturating_sub(removed_by_limit + removed_by_age)
        } else {
            self.supabase.count(TABLE, Some(auth_token)).await.map_err(Self::db)?
        };

        Ok(PurgeReport {
            dry_run: request.dry_run,
            total_before,
            removed_by_limit,
            removed_by_age,
            total_after,
        })
    }
}
