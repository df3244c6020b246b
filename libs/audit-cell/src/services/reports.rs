use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::try_join_all;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{local_day_start, local_month_start, query_timestamp};
use shared_utils::pagination::{offset_for, resolve_page, Page};
use shared_utils::validation::ilike_pattern;

use crate::models::{
    estimated_size_mb, ActorOption, AuditAction, AuditBrowse, AuditEntry, AuditError, AuditFilters,
    AuditModule, AuditStatistics, AuditSummary, CountByKey, FilterOption,
};

pub const AUDIT_PAGE_SIZE: u64 = 50;
const ACTOR_OPTION_LIMIT: u64 = 100;

const TABLE: &str = "/rest/v1/audit_logs";

#[derive(Debug, Deserialize)]
struct TimestampRow {
    occurred_at: DateTime<Utc>,
}

fn filter_params(filters: &AuditFilters) -> Vec<String> {
    let mut params = Vec::new();

    if let Some(module) = filters.modulo {
        params.push(format!("module=eq.{}", module.as_str()));
    }
    if let Some(action) = filters.accion {
        params.push(format!("action=eq.{}", action.as_str()));
    }
    if let Some(actor) = filters.usuario.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        params.push(format!("actor_id=eq.{}", urlencoding::encode(actor)));
    }
    if let Some(term) = filters.buscar.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        let pattern = ilike_pattern(term);
        params.push(format!(
            "or=(description.ilike.{p},details.ilike.{p},object_type.ilike.{p})",
            p = pattern
        ));
    }

    params
}

fn table_path(params: &[String]) -> String {
    if params.is_empty() {
        TABLE.to_string()
    } else {
        format!("{}?{}", TABLE, params.join("&"))
    }
}

/// Read side of the audit log for administrators.
pub struct AuditReportService {
    supabase: SupabaseClient,
    timezone: Tz,
}

impl AuditReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            timezone: config.clinic_timezone,
        }
    }

    async fn count(&self, params: &[String], auth_token: &str) -> Result<u64, AuditError> {
        self.supabase
            .count(&table_path(params), Some(auth_token))
            .await
            .map_err(|e| AuditError::DatabaseError(e.to_string()))
    }

    async fn count_since(&self, since: DateTime<Utc>, auth_token: &str) -> Result<u64, AuditError> {
        self.count(&[format!("occurred_at=gte.{}", query_timestamp(since))], auth_token)
            .await
    }

    async fn edge_timestamp(
        &self,
        ascending: bool,
        auth_token: &str,
    ) -> Result<Option<DateTime<Utc>>, AuditError> {
        let order = if ascending { "asc" } else { "desc" };
        let path = format!("{}?select=occurred_at&order=occurred_at.{}&limit=1", TABLE, order);
        let rows: Vec<TimestampRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AuditError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().next().map(|row| row.occurred_at))
    }

    async fn summary(
        &self,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<AuditSummary, AuditError> {
        let total = self.count(&[], auth_token).await?;
        let today = self
            .count_since(local_day_start(now, self.timezone, 0), auth_token)
            .await?;
        let this_month = self
            .count_since(local_month_start(now, self.timezone), auth_token)
            .await?;

        let module_counts = try_join_all(AuditModule::ALL.iter().map(|module| async move {
            let count = self
                .count(&[format!("module=eq.{}", module.as_str())], auth_token)
                .await?;
            Ok::<_, AuditError>(CountByKey {
                key: module.as_str(),
                label: module.label(),
                count,
            })
        }))
        .await?;

        let action_counts = try_join_all(AuditAction::ALL.iter().map(|action| async move {
            let count = self
                .count(&[format!("action=eq.{}", action.as_str())], auth_token)
                .await?;
            Ok::<_, AuditError>(CountByKey {
                key: action.as_str(),
                label: action.label(),
                count,
            })
        }))
        .await?;

        Ok(AuditSummary {
            total,
            today,
            this_month,
            by_module: module_counts.into_iter().filter(|c| c.count > 0).collect(),
            by_action: action_counts.into_iter().filter(|c| c.count > 0).collect(),
        })
    }

    /// Active staff, by name, for the actor filter.
    async fn actor_options(&self, auth_token: &str) -> Result<Vec<ActorOption>, AuditError> {
        let path = format!(
            "/rest/v1/staff_profiles?active=is.true&select=user_id,full_name\
             &order=full_name.asc&limit={}",
            ACTOR_OPTION_LIMIT
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AuditError::DatabaseError(e.to_string()))
    }

    #[instrument(skip(self, auth_token))]
    pub async fn browse(
        &self,
        filters: &AuditFilters,
        auth_token: &str,
    ) -> Result<AuditBrowse, AuditError> {
        let params = filter_params(filters);
        let total = self.count(&params, auth_token).await?;
        let page = resolve_page(filters.page.as_deref(), total, AUDIT_PAGE_SIZE);

        let mut query = params.clone();
        query.push("order=occurred_at.desc".to_string());
        query.push(format!("limit={}", AUDIT_PAGE_SIZE));
        query.push(format!("offset={}", offset_for(page, AUDIT_PAGE_SIZE)));

        let entries: Vec<AuditEntry> = self
            .supabase
            .request(Method::GET, &table_path(&query), Some(auth_token), None)
            .await
            .map_err(|e| AuditError::DatabaseError(e.to_string()))?;

        debug!(total, page, returned = entries.len(), "audit page loaded");

        let summary = self.summary(Utc::now(), auth_token).await?;
        let users = self.actor_options(auth_token).await?;

        Ok(AuditBrowse {
            entries: Page::new(entries, page, AUDIT_PAGE_SIZE, total),
            summary,
            modules: AuditModule::ALL
                .iter()
                .filter(|m| m.is_filterable())
                .map(|m| FilterOption { value: m.as_str(), label: m.label() })
                .collect(),
            actions: AuditAction::ALL
                .iter()
                .filter(|a| a.is_filterable())
                .map(|a| FilterOption { value: a.as_str(), label: a.label() })
                .collect(),
            users,
        })
    }

    #[instrument(skip(self, auth_token))]
    pub async fn statistics(&self, auth_token: &str) -> Result<AuditStatistics, AuditError> {
        let now = Utc::now();
        let total = self.count(&[], auth_token).await?;
        let today = self
            .count_since(local_day_start(now, self.timezone, 0), auth_token)
            .await?;
        let last_7_days = self
            .count_since(local_day_start(now, self.timezone, 7), auth_token)
            .await?;
        let last_30_days = self
            .count_since(local_day_start(now, self.timezone, 30), auth_token)
            .await?;

        let oldest = self.edge_timestamp(true, auth_token).await?;
        let newest = self.edge_timestamp(false, auth_token).await?;

        Ok(AuditStatistics {
            total,
            today,
            last_7_days,
            last_30_days,
            oldest,
            newest,
            estimated_size_mb: estimated_size_mb(total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_become_postgrest_params() {
        let filters = AuditFilters {
            modulo: Some(AuditModule::Rooms),
            accion: Some(AuditAction::Delete),
            usuario: Some("  ".to_string()),
            buscar: Some("sala 2".to_string()),
            page: None,
        };

        let params = filter_params(&filters);
        assert_eq!(params[0], "module=eq.salas");
        assert_eq!(params[1], "action=eq.eliminar");
        assert_eq!(
            params[2],
            "or=(description.ilike.*sala%202*,details.ilike.*sala%202*,\
             object_type.ilike.*sala%202*)"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_filters_hit_bare_table() {
        assert_eq!(table_path(&filter_params(&AuditFilters::default())), TABLE);
    }
}
