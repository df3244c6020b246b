use patient_cell::models::PatientError;
use patient_cell::services::ClientService;
use shared_models::auth::PatientPrincipal;

use crate::models::ClinicalError;

pub(crate) fn client_error(error: PatientError) -> ClinicalError {
    match error {
        PatientError::ClientNotFound => ClinicalError::NotFound("Cliente no encontrado"),
        other => ClinicalError::DatabaseError(other.to_string()),
    }
}

/// Which clinical rows a patient may see: those tied to any of their active
/// client records, or recorded under their e-mail.
#[derive(Debug, Clone)]
pub struct PatientScope {
    pub email: String,
    pub client_ids: Vec<i64>,
}

impl PatientScope {
    pub async fn resolve(
        clients: &ClientService,
        patient: &PatientPrincipal,
        auth_token: &str,
    ) -> Result<Self, ClinicalError> {
        let client_ids = clients
            .active_ids_by_email(&patient.email, auth_token)
            .await
            .map_err(|e| ClinicalError::DatabaseError(e.to_string()))?;

        Ok(Self {
            email: patient.email.clone(),
            client_ids,
        })
    }

    pub fn owns(&self, client_id: Option<i64>, patient_email: Option<&str>) -> bool {
        client_id.is_some_and(|id| self.client_ids.contains(&id))
            || patient_email.is_some_and(|email| email.eq_ignore_ascii_case(&self.email))
    }

    fn id_list(&self) -> String {
        let ids: Vec<String> = self.client_ids.iter().map(i64::to_string).collect();
        ids.join(",")
    }

    /// `client_id=in.(…)`, or `None` when the patient has no client record yet.
    pub fn client_filter(&self) -> Option<String> {
        if self.client_ids.is_empty() {
            None
        } else {
            Some(format!("client_id=in.({})", self.id_list()))
        }
    }

    /// PostgREST `or=` filter matching by client id or by patient e-mail.
    pub fn client_or_email_filter(&self) -> String {
        let by_email = format!("patient_email.eq.\"{}\"", self.email);
        let clause = if self.client_ids.is_empty() {
            format!("({})", by_email)
        } else {
            format!("({},client_id.in.({}))", by_email, self.id_list())
        };
        format!("or={}", urlencoding::encode(&clause))
    }
}
