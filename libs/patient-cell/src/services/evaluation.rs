use reqwest::Method;
use serde_json::json;
use tracing::{info, instrument};

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, PatientPrincipal};

use crate::models::{Evaluation, EvaluationStatus, PatientError, SubmitEvaluationRequest};

/// Service ratings left by patients; each user may rate once.
pub struct EvaluationService {
    supabase: SupabaseClient,
    audit: AuditService,
}

impl EvaluationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            audit: AuditService::new(config),
        }
    }

    pub async fn get_mine(
        &self,
        patient: &PatientPrincipal,
        auth_token: &str,
    ) -> Result<Option<Evaluation>, PatientError> {
        let path = format!(
            "/rest/v1/evaluations?user_id=eq.{}&order=created_at.desc&limit=1",
            patient.user_id
        );
        let rows: Vec<Evaluation> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, patient, request, auth_token), fields(account_id = patient.id))]
    pub async fn submit(
        &self,
        patient: &PatientPrincipal,
        request: &SubmitEvaluationRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<Evaluation, PatientError> {
        let comment = request.validate()?;

        if self.get_mine(patient, auth_token).await?.is_some() {
            return Err(PatientError::EvaluationExists);
        }

        let body = json!({
            "user_id": patient.user_id,
            "client_email": patient.email,
            "stars": request.estrellas,
            "comment": comment,
            "ip_address": ip_address,
            "status": EvaluationStatus::Pendiente,
        });

        let rows: Vec<Evaluation> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/evaluations",
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let evaluation = rows
            .into_iter()
            .next()
            .ok_or_else(|| {
                PatientError::DatabaseError("Evaluation insert returned no rows".to_string())
            })?;

        info!(evaluation_id = evaluation.id, stars = evaluation.stars, "evaluation submitted");

        let entry = NewAuditEntry::new(
            AuditAction::Create,
            AuditModule::Evaluations,
            format!(
                "{} envió una evaluación de {} estrellas",
                patient.full_name, evaluation.stars
            ),
        )
        .with_actor(&Actor::Patient(patient.clone()))
        .with_object("evaluacion", evaluation.id)
        .with_ip(evaluation.ip_address.clone());
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(evaluation)
    }
}
