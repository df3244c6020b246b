use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, PatientPrincipal, StaffPrincipal};
use shared_models::error::AppError;

const STAFF_COLUMNS: &str = "id,user_id,full_name,email,role,active";
const PATIENT_COLUMNS: &str = "id,user_id,full_name,email,phone,rut,active";

/// Resolves an authenticated user id against the two account backends:
/// `staff_profiles` for clinic staff and `client_accounts` for patients.
pub struct PrincipalService {
    supabase: SupabaseClient,
}

impl PrincipalService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn first_row<T: DeserializeOwned>(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Option<T>, AppError> {
        let rows: Vec<T> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, auth_token))]
    pub async fn find_staff(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<StaffPrincipal>, AppError> {
        let path = format!(
            "/rest/v1/staff_profiles?user_id=eq.{}&select={}&limit=1",
            user_id, STAFF_COLUMNS
        );
        let staff = self.first_row::<StaffPrincipal>(&path, auth_token).await?;
        debug!(found = staff.is_some(), "staff lookup finished");
        Ok(staff)
    }

    #[instrument(skip(self, auth_token))]
    pub async fn find_patient(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<PatientPrincipal>, AppError> {
        let path = format!(
            "/rest/v1/client_accounts?user_id=eq.{}&select={}&limit=1",
            user_id, PATIENT_COLUMNS
        );
        let patient = self.first_row::<PatientPrincipal>(&path, auth_token).await?;
        debug!(found = patient.is_some(), "patient lookup finished");
        Ok(patient)
    }

    /// Staff profiles win over patient accounts when a user somehow has both.
    pub async fn resolve_actor(&self, user_id: &str, auth_token: &str) -> Result<Actor, AppError> {
        if let Some(staff) = self.find_staff(user_id, auth_token).await? {
            return Ok(Actor::Staff(staff));
        }
        if let Some(patient) = self.find_patient(user_id, auth_token).await? {
            return Ok(Actor::Patient(patient));
        }
        Ok(Actor::Anonymous)
    }
}
