use reqwest::Method;
use serde_json::json;
use tracing::{info, instrument};

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use patient_cell::services::ClientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, PatientPrincipal, StaffPrincipal};

use crate::models::{ClinicalError, CreateOdontogramRequest, Odontogram, OdontogramView};
use crate::services::scope::{client_error, PatientScope};

const ODONTOGRAMS: &str = "/rest/v1/odontograms";
const ODONTOGRAM_SELECT: &str = "*,teeth(count)";

pub struct OdontogramService {
    supabase: SupabaseClient,
    clients: ClientService,
    audit: AuditService,
}

impl OdontogramService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clients: ClientService::new(config),
            audit: AuditService::new(config),
        }
    }

    fn db(e: anyhow::Error) -> ClinicalError {
        ClinicalError::DatabaseError(e.to_string())
    }

    #[instrument(skip(self, patient, auth_token))]
    pub async fn list_for_patient(
        &self,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<Vec<OdontogramView>, ClinicalError> {
        let path = format!(
            "{}?{}&select={}&order=created_at.desc",
            ODONTOGRAMS,
            patient.client_or_email_filter(),
            ODONTOGRAM_SELECT
        );
        let rows: Vec<Odontogram> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;

        Ok(rows.into_iter().map(OdontogramView::from).collect())
    }

    pub async fn get_for_patient(
        &self,
        odontogram_id: i64,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<OdontogramView, ClinicalError> {
        let path = format!(
            "{}?id=eq.{}&select={}&limit=1",
            ODONTOGRAMS, odontogram_id, ODONTOGRAM_SELECT
        );
        let rows: Vec<Odontogram> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;

        rows.into_iter()
            .next()
            .filter(|o| patient.owns(o.client_id, o.patient_email.as_deref()))
            .map(OdontogramView::from)
            .ok_or(ClinicalError::NotFound("Odontograma no encontrado"))
    }

    pub async fn scope_for(
        &self,
        patient: &PatientPrincipal,
        auth_token: &str,
    ) -> Result<PatientScope, ClinicalError> {
        PatientScope::resolve(&self.clients, patient, auth_token).await
    }

    #[instrument(skip(self, staff, request, auth_token), fields(staff_id = staff.id))]
    pub async fn create_odontogram(
        &self,
        staff: &StaffPrincipal,
        request: &CreateOdontogramRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<OdontogramView, ClinicalError> {
        let reason = request.motivo_consulta.trim();
        if reason.is_empty() {
            return Err(ClinicalError::Validation(
                "El motivo de consulta es obligatorio".to_string(),
            ));
        }

        let client = self
            .clients
            .get_client(request.cliente_id, auth_token)
            .await
            .map_err(client_error)?;

        let body = json!({
            "client_id": client.id,
            "appointment_id": request.cita_id,
            "dentist_id": staff.id,
            "patient_name": client.full_name,
            "patient_email": client.email,
            "reason": reason,
            "general_state": request.estado_general,
            "oral_hygiene": request.higiene_oral,
            "treatment_plan": request.plan_tratamiento,
        });

        let rows: Vec<Odontogram> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &format!("{}?select={}", ODONTOGRAMS, ODONTOGRAM_SELECT),
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let odontogram = rows
            .into_iter()
            .next()
            .ok_or_else(|| {
                ClinicalError::DatabaseError("Odontogram insert returned no rows".to_string())
            })?;

        info!(odontogram_id = odontogram.id, client_id = client.id, "odontogram created");

        let entry = NewAuditEntry::new(
            AuditAction::Create,
            AuditModule::Odontograms,
            format!("Odontograma creado para {}", client.full_name),
        )
        .with_actor(&Actor::Staff(staff.clone()))
        .with_object("odontograma", odontogram.id)
        .with_details(format!("Motivo: {}", reason))
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(OdontogramView::from(odontogram))
    }
}
