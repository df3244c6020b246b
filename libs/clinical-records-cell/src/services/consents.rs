use std::collections::HashSet;

use chrono::Utc;
use reqwest::Method;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use patient_cell::services::ClientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, PatientPrincipal, StaffPrincipal};
use shared_utils::clock::query_timestamp;

use crate::models::{
    ClinicalError, Consent, ConsentStatus, ConsentView, CreateConsentRequest, SignConsentRequest,
};
use crate::services::scope::{client_error, PatientScope};

const CONSENTS: &str = "/rest/v1/consents";

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Serialize)]
pub struct ConsentList {
    pub consentimientos: Vec<ConsentView>,
    pub total: usize,
    pub pendientes: usize,
    pub firmados: usize,
}

impl ConsentList {
    fn from_rows(rows: Vec<Consent>) -> Self {
        let mut seen = HashSet::new();
        let consentimientos: Vec<ConsentView> = rows
            .into_iter()
            .filter(|c| seen.insert(c.id))
            .map(ConsentView::from)
            .collect();

        let count = |status: ConsentStatus| {
            consentimientos
                .iter()
                .filter(|c| c.consent.status == status)
                .count()
        };
        Self {
            total: consentimientos.len(),
            pendientes: count(ConsentStatus::Pendiente),
            firmados: count(ConsentStatus::Firmado),
            consentimientos,
        }
    }
}

/// Consents are tied to client records only, never matched by e-mail.
pub struct ConsentService {
    supabase: SupabaseClient,
    clients: ClientService,
    audit: AuditService,
}

impl ConsentService {
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

    pub async fn scope_for(
        &self,
        patient: &PatientPrincipal,
        auth_token: &str,
    ) -> Result<PatientScope, ClinicalError> {
        PatientScope::resolve(&self.clients, patient, auth_token).await
    }

    pub async fn list_for_patient(
        &self,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<ConsentList, ClinicalError> {
        let Some(filter) = patient.client_filter() else {
            return Ok(ConsentList::from_rows(Vec::new()));
        };

        let path = format!("{}?{}&order=created_at.desc", CONSENTS, filter);
        let rows: Vec<Consent> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;

        Ok(ConsentList::from_rows(rows))
    }

    async fn get_owned(
        &self,
        consent_id: i64,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<Consent, ClinicalError> {
        let path = format!("{}?id=eq.{}&limit=1", CONSENTS, consent_id);
        let rows: Vec<Consent> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;

        rows.into_iter()
            .next()
            .filter(|c| patient.owns(Some(c.client_id), None))
            .ok_or(ClinicalError::NotFound("Consentimiento no encontrado"))
    }

    pub async fn get(
        &self,
        consent_id: i64,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<ConsentView, ClinicalError> {
        self.get_owned(consent_id, patient, auth_token)
            .await
            .map(ConsentView::from)
    }

    #[instrument(skip(self, patient, scope, form, auth_token), fields(account_id = patient.id))]
    pub async fn sign(
        &self,
        consent_id: i64,
        patient: &PatientPrincipal,
        scope: &PatientScope,
        form: &SignConsentRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<ConsentView, ClinicalError> {
        let consent = self.get_owned(consent_id, scope, auth_token).await?;

        if consent.status != ConsentStatus::Pendiente {
            return Err(ClinicalError::Validation(
                "Este consentimiento ya ha sido firmado o no está disponible".to_string(),
            ));
        }
        let Some(signature) = non_empty(Some(&form.firma_paciente)) else {
            return Err(ClinicalError::Validation(
                "La firma del paciente es obligatoria".to_string(),
            ));
        };
        if !form.declaracion_comprension {
            return Err(ClinicalError::Validation(
                "Debe confirmar la declaración de comprensión".to_string(),
            ));
        }
        if !form.derecho_revocacion {
            return Err(ClinicalError::Validation(
                "Debe confirmar que conoce su derecho de revocación".to_string(),
            ));
        }

        let signer_name = non_empty(form.nombre_firmante.as_deref())
            .unwrap_or_else(|| patient.full_name.clone());
        let signer_rut = non_empty(form.rut_firmante.as_deref()).or_else(|| patient.rut.clone());

        let changes = json!({
            "status": ConsentStatus::Firmado,
            "patient_signature": signature,
            "signer_name": signer_name,
            "signer_rut": signer_rut,
            "witness_name": non_empty(form.nombre_testigo.as_deref()),
            "witness_rut": non_empty(form.rut_testigo.as_deref()),
            "witness_signature": non_empty(form.firma_testigo.as_deref()),
            "understanding_declared": true,
            "revocation_acknowledged": true,
            "signed_at": query_timestamp(Utc::now()),
        });

        let path = format!(
            "{}?id=eq.{}&status=eq.{}",
            CONSENTS,
            consent_id,
            ConsentStatus::Pendiente
        );
        let rows: Vec<Consent> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(changes),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let signed = rows.into_iter().next().ok_or_else(|| {
            warn!(consent_id, "consent changed status while signing");
            ClinicalError::Conflict(
                "El consentimiento cambió de estado; recargue la página".to_string(),
            )
        })?;

        info!(consent_id, "consent signed");

        let entry = NewAuditEntry::new(
            AuditAction::Sign,
            AuditModule::Consents,
            format!("{} firmó el consentimiento \"{}\"", signer_name, signed.title),
        )
        .with_actor(&Actor::Patient(patient.clone()))
        .with_object("consentimiento", signed.id)
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(ConsentView::from(signed))
    }

    #[instrument(
        skip(self, staff, request, auth_token),
        fields(staff_id = staff.id, client_id = request.cliente_id)
    )]
    pub async fn create_consent(
        &self,
        staff: &StaffPrincipal,
        request: &CreateConsentRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<ConsentView, ClinicalError> {
        let title = request.titulo.trim();
        if title.is_empty() {
            return Err(ClinicalError::Validation("El título es obligatorio".to_string()));
        }
        let procedure_kind = request.tipo_procedimiento.trim();
        if procedure_kind.is_empty() {
            return Err(ClinicalError::Validation(
                "El tipo de procedimiento es obligatorio".to_string(),
            ));
        }

        let client = self
            .clients
            .get_client(request.cliente_id, auth_token)
            .await
            .map_err(client_error)?;

        let body = json!({
            "client_id": client.id,
            "treatment_plan_id": request.plan_tratamiento_id,
            "dentist_id": staff.id,
            "title": title,
            "procedure_kind": procedure_kind,
            "status": ConsentStatus::Pendiente,
            "content": non_empty(request.contenido.as_deref()),
            "diagnosis": non_empty(request.diagnostico.as_deref()),
            "procedure_nature": non_empty(request.naturaleza_procedimiento.as_deref()),
            "goals": non_empty(request.objetivos_tratamiento.as_deref()),
            "risks": non_empty(request.riesgos.as_deref()),
            "benefits": non_empty(request.beneficios.as_deref()),
            "alternatives": non_empty(request.alternativas.as_deref()),
            "prognosis": non_empty(request.pronostico.as_deref()),
            "post_op_care": non_empty(request.cuidados_postoperatorios.as_deref()),
            "expires_on": request.fecha_vencimiento,
        });

        let rows: Vec<Consent> = self
            .supabase
            .request_with_headers(
                Method::POST,
                CONSENTS,
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let consent = rows
            .into_iter()
            .next()
            .ok_or_else(|| {
                ClinicalError::DatabaseError("Consent insert returned no rows".to_string())
            })?;

        let entry = NewAuditEntry::new(
            AuditAction::Create,
            AuditModule::Consents,
            format!("Consentimiento \"{}\" creado para {}", consent.title, client.full_name),
        )
        .with_actor(&Actor::Staff(staff.clone()))
        .with_object("consentimiento", consent.id)
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(ConsentView::from(consent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn consent(id: i64, status: &str) -> Consent {
        serde_json::from_value(json!({
            "id": id,
            "client_id": 3,
            "title": "Endodoncia pieza 36",
            "procedure_kind": "endodoncia",
            "status": status,
            "created_at": "2025-01-15T12:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn listing_drops_duplicates_and_counts_statuses() {
        let list = ConsentList::from_rows(vec![
            consent(1, "pendiente"),
            consent(2, "firmado"),
            consent(1, "pendiente"),
            consent(3, "vencido"),
        ]);
        assert_eq!(list.total, 3);
        assert_eq!(list.pendientes, 1);
        assert_eq!(list.firmados, 1);
    }
}
