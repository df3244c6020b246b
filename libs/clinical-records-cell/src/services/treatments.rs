use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{info, instrument};

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use patient_cell::services::ClientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, PatientPrincipal, StaffPrincipal};
use shared_utils::clock::query_timestamp;
use shared_utils::formatting::format_price;

use crate::models::{
    ClinicalError, CreatePlanRequest, TreatmentPlan, CLOSED_PLAN_STATUSES, NEW_PLAN_STATUS,
};
use crate::services::scope::{client_error, PatientScope};

const PLANS: &str = "/rest/v1/treatment_plans";

/// Treatment plans and the budgets patients accept before work starts.
pub struct TreatmentPlanService {
    supabase: SupabaseClient,
    clients: ClientService,
    audit: AuditService,
}

impl TreatmentPlanService {
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

    async fn list(
        &self,
        patient: &PatientScope,
        extra: &[String],
        auth_token: &str,
    ) -> Result<Vec<TreatmentPlan>, ClinicalError> {
        let Some(filter) = patient.client_filter() else {
            return Ok(Vec::new());
        };

        let mut params = vec![filter];
        params.extend_from_slice(extra);
        params.push("order=created_at.desc".to_string());

        let path = format!("{}?{}", PLANS, params.join("&"));
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)
    }

    /// Budgets still awaiting acceptance on open plans.
    pub async fn pending_budgets(
        &self,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<Vec<TreatmentPlan>, ClinicalError> {
        let filters = [
            "budget_accepted=is.false".to_string(),
            format!("status=not.in.({})", CLOSED_PLAN_STATUSES.join(",")),
        ];
        self.list(patient, &filters, auth_token).await
    }

    /// Plans whose budget has been accepted.
    pub async fn treatments(
        &self,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<Vec<TreatmentPlan>, ClinicalError> {
        self.list(patient, &["budget_accepted=is.true".to_string()], auth_token)
            .await
    }

    pub async fn get(
        &self,
        plan_id: i64,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<TreatmentPlan, ClinicalError> {
        let path = format!("{}?id=eq.{}&limit=1", PLANS, plan_id);
        let rows: Vec<TreatmentPlan> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;

        rows.into_iter()
            .next()
            .filter(|plan| patient.owns(Some(plan.client_id), None))
            .ok_or(ClinicalError::NotFound("Presupuesto no encontrado"))
    }

    #[instrument(skip(self, patient, scope, auth_token), fields(account_id = patient.id))]
    pub async fn accept_budget(
        &self,
        plan_id: i64,
        patient: &PatientPrincipal,
        scope: &PatientScope,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<TreatmentPlan, ClinicalError> {
        let plan = self.get(plan_id, scope, auth_token).await?;

        if plan.budget_accepted {
            return Err(ClinicalError::Validation(
                "Este presupuesto ya ha sido aceptado".to_string(),
            ));
        }
        if plan.is_closed() {
            return Err(ClinicalError::Validation(
                "Este presupuesto no puede ser aceptado en su estado actual".to_string(),
            ));
        }

        let path = format!("{}?id=eq.{}&budget_accepted=is.false", PLANS, plan_id);
        let rows: Vec<TreatmentPlan> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "budget_accepted": true,
                    "budget_accepted_at": query_timestamp(Utc::now()),
                })),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let accepted = rows.into_iter().next().ok_or_else(|| {
            ClinicalError::Validation("Este presupuesto ya ha sido aceptado".to_string())
        })?;

        info!(plan_id, "budget accepted");

        let entry = NewAuditEntry::new(
            AuditAction::Accept,
            AuditModule::Treatments,
            format!("{} aceptó el presupuesto \"{}\"", patient.full_name, accepted.name),
        )
        .with_actor(&Actor::Patient(patient.clone()))
        .with_object("plan_tratamiento", accepted.id)
        .with_details(format!("Precio final: {}", format_price(accepted.final_price)))
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(accepted)
    }

    #[instrument(
        skip(self, staff, request, auth_token),
        fields(staff_id = staff.id, client_id = request.cliente_id)
    )]
    pub async fn create_plan(
        &self,
        staff: &StaffPrincipal,
        request: &CreatePlanRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<TreatmentPlan, ClinicalError> {
        let final_price = request.final_price()?;

        let client = self
            .clients
            .get_client(request.cliente_id, auth_token)
            .await
            .map_err(client_error)?;

        let body = json!({
            "client_id": client.id,
            "dentist_id": staff.id,
            "name": request.nombre.trim(),
            "description": request.descripcion.as_deref().map(str::trim).filter(|d| !d.is_empty()),
            "status": NEW_PLAN_STATUS,
            "budget_total": request.presupuesto_total,
            "discount": request.descuento,
            "final_price": final_price,
            "budget_accepted": false,
        });

        let rows: Vec<TreatmentPlan> = self
            .supabase
            .request_with_headers(
                Method::POST,
                PLANS,
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let plan = rows
            .into_iter()
            .next()
            .ok_or_else(|| {
                ClinicalError::DatabaseError("Treatment plan insert returned no rows".to_string())
            })?;

        let entry = NewAuditEntry::new(
            AuditAction::Create,
            AuditModule::Treatments,
            format!("Plan de tratamiento \"{}\" creado para {}", plan.name, client.full_name),
        )
        .with_actor(&Actor::Staff(staff.clone()))
        .with_object("plan_tratamiento", plan.id)
        .with_details(format!("Presupuesto: {}", format_price(final_price)))
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(plan)
    }
}
