use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, StaffPrincipal};
use shared_utils::phone::normalize_staff_phone;

use crate::models::{StaffError, StaffProfile, UpdateStaffProfileRequest};

const PROFILE_SELECT: &str = "*,room:rooms(id,name)";

pub struct StaffService {
    supabase: SupabaseClient,
    audit: AuditService,
}

impl StaffService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            audit: AuditService::new(config),
        }
    }

    async fn fetch(&self, path: &str, auth_token: &str) -> Result<Vec<StaffProfile>, StaffError> {
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))
    }

    #[instrument(skip(self, auth_token))]
    pub async fn list_active_dentists(
        &self,
        auth_token: &str,
    ) -> Result<Vec<StaffProfile>, StaffError> {
        let path = format!(
            "/rest/v1/staff_profiles?role=eq.dentista&active=is.true&select={}&order=full_name.asc",
            PROFILE_SELECT
        );
        let dentists = self.fetch(&path, auth_token).await?;
        debug!(count = dentists.len(), "active dentists loaded");
        Ok(dentists)
    }

    /// Any staff profile with role `dentista`, active or not.
    pub async fn find_dentist(
        &self,
        dentist_id: i64,
        auth_token: &str,
    ) -> Result<Option<StaffProfile>, StaffError> {
        let path = format!(
            "/rest/v1/staff_profiles?id=eq.{}&role=eq.dentista&select={}&limit=1",
            dentist_id, PROFILE_SELECT
        );
        Ok(self.fetch(&path, auth_token).await?.into_iter().next())
    }

    pub async fn get_my_profile(
        &self,
        staff: &StaffPrincipal,
        auth_token: &str,
    ) -> Result<StaffProfile, StaffError> {
        let path = format!(
            "/rest/v1/staff_profiles?id=eq.{}&select={}&limit=1",
            staff.id, PROFILE_SELECT
        );
        self.fetch(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(StaffError::ProfileNotFound)
    }

    #[instrument(skip(self, staff, request, auth_token), fields(staff_id = staff.id))]
    pub async fn update_my_profile(
        &self,
        staff: &StaffPrincipal,
        request: UpdateStaffProfileRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<StaffProfile, StaffError> {
        let mut changes = Map::new();

        if let Some(name) = request.full_name.as_deref().map(str::trim) {
            if name.is_empty() {
                return Err(StaffError::Validation("El nombre es requerido".to_string()));
            }
            changes.insert("full_name".to_string(), json!(name));
        }
        if let Some(raw) = request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            let phone = normalize_staff_phone(raw).ok_or(StaffError::InvalidPhone)?;
            changes.insert("phone".to_string(), json!(phone));
        }

        if changes.is_empty() {
            return self.get_my_profile(staff, auth_token).await;
        }

        let fields: Vec<String> = changes.keys().cloned().collect();
        let rows: Vec<StaffProfile> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/staff_profiles?id=eq.{}", staff.id),
                Some(auth_token),
                Some(Value::Object(changes)),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let profile = rows.into_iter().next().ok_or(StaffError::ProfileNotFound)?;
        info!(fields = ?fields, "staff profile updated");

        let entry = NewAuditEntry::new(
            AuditAction::Update,
            AuditModule::Staff,
            format!("{} actualizó su perfil", profile.full_name),
        )
        .with_actor(&Actor::Staff(staff.clone()))
        .with_object("perfil", profile.id)
        .with_details(format!("Campos modificados: {}", fields.join(", ")))
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(profile)
    }
}
