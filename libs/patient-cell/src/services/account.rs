use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, PatientPrincipal};
use shared_utils::phone::normalize_chilean_phone;

use crate::models::{PatientAccount, PatientError, UpdateProfileRequest};

pub struct AccountService {
    supabase: SupabaseClient,
    audit: AuditService,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            audit: AuditService::new(config),
        }
    }

    pub async fn get_my_profile(
        &self,
        patient: &PatientPrincipal,
        auth_token: &str,
    ) -> Result<PatientAccount, PatientError> {
        let path = format!("/rest/v1/client_accounts?id=eq.{}&limit=1", patient.id);
        let rows: Vec<PatientAccount> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(PatientError::AccountNotFound)
    }

    #[instrument(skip(self, patient, request, auth_token), fields(account_id = patient.id))]
    pub async fn update_my_profile(
        &self,
        patient: &PatientPrincipal,
        request: UpdateProfileRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<PatientAccount, PatientError> {
        let mut changes = Map::new();

        if let Some(name) = request.full_name.as_deref().map(str::trim) {
            if name.is_empty() {
                return Err(PatientError::Validation("El nombre es requerido".to_string()));
            }
            changes.insert("full_name".to_string(), json!(name));
        }

        if let Some(raw) = request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            let phone = normalize_chilean_phone(raw)
                .ok_or_else(|| PatientError::InvalidPhone(raw.to_string()))?;
            changes.insert("phone".to_string(), json!(phone));
        }

        if let Some(rut) = request.rut.as_deref().map(str::trim) {
            changes.insert(
                "rut".to_string(),
                if rut.is_empty() { Value::Null } else { json!(rut) },
            );
        }

        if changes.is_empty() {
            return self.get_my_profile(patient, auth_token).await;
        }

        let fields: Vec<String> = changes.keys().cloned().collect();
        let rows: Vec<PatientAccount> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/client_accounts?id=eq.{}", patient.id),
                Some(auth_token),
                Some(Value::Object(changes)),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let account = rows.into_iter().next().ok_or(PatientError::AccountNotFound)?;
        info!(fields = ?fields, "patient profile updated");

        let entry = NewAuditEntry::new(
            AuditAction::Update,
            AuditModule::Clients,
            format!("{} actualizó su perfil", account.full_name),
        )
        .with_actor(&Actor::Patient(patient.clone()))
        .with_object("perfil_cliente", account.id)
        .with_details(format!("Campos modificados: {}", fields.join(", ")))
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(account)
    }
}
