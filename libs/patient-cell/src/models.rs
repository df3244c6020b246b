use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

/// Clinical client record (`clients` table), shared by staff and patient flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub rut: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub allergies: Option<String>,
    pub active: bool,
    pub assigned_dentist_id: Option<i64>,
    pub registered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_dentist: Option<AssignedDentist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedDentist {
    pub full_name: String,
}

/// Login-facing patient account (`client_accounts` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientAccount {
    pub id: i64,
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub rut: Option<String>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Who a client record should describe when it is looked up or created from a booking.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub rut: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyClientQuery {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientListQuery {
    pub search: Option<String>,
    /// `activo` / `inactivo`; anything else lists every client.
    pub estado: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Pendiente,
    Enviada,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub user_id: String,
    pub client_email: String,
    pub stars: i32,
    pub comment: String,
    pub ip_address: Option<String>,
    pub status: EvaluationStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitEvaluationRequest {
    pub estrellas: i32,
    #[serde(default)]
    pub comentario: String,
}

pub const MAX_COMMENT_CHARS: usize = 500;

impl SubmitEvaluationRequest {
    pub fn validate(&self) -> Result<String, PatientError> {
        if !(1..=5).contains(&self.estrellas) {
            return Err(PatientError::Validation(
                "Las estrellas deben estar entre 1 y 5".to_string(),
            ));
        }
        let comment = self.comentario.trim();
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(PatientError::Validation(format!(
                "El comentario no puede exceder {} caracteres",
                MAX_COMMENT_CHARS
            )));
        }
        Ok(comment.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("Cliente no encontrado")]
    ClientNotFound,

    #[error("Perfil de cliente no encontrado")]
    AccountNotFound,

    #[error("Número de teléfono inválido: {0}")]
    InvalidPhone(String),

    #[error("{0}")]
    Validation(String),

    #[error("Ya has enviado una evaluación. Solo se permite una evaluación por cliente.")]
    EvaluationExists,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PatientError> for AppError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::ClientNotFound | PatientError::AccountNotFound => {
                AppError::NotFound(error.to_string())
            }
            PatientError::InvalidPhone(_) | PatientError::Validation(_) => {
                AppError::ValidationError(error.to_string())
            }
            PatientError::EvaluationExists => AppError::Conflict(error.to_string()),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(stars: i32, comment: &str) -> SubmitEvaluationRequest {
        SubmitEvaluationRequest {
            estrellas: stars,
            comentario: comment.to_string(),
        }
    }

    #[test]
    fn stars_must_be_between_one_and_five() {
        assert_matches!(request(0, "").validate(), Err(PatientError::Validation(_)));
        assert_matches!(request(6, "").validate(), Err(PatientError::Validation(_)));
        assert_eq!(request(5, "  Excelente  ").validate().unwrap(), "Excelente");
    }

    #[test]
    fn comment_limit_counts_characters_not_bytes() {
        let accented = "á".repeat(MAX_COMMENT_CHARS);
        assert!(request(4, &accented).validate().is_ok());

        let too_long = "a".repeat(MAX_COMMENT_CHARS + 1);
        assert_matches!(request(4, &too_long).validate(), Err(PatientError::Validation(_)));
    }

    #[test]
    fn duplicate_evaluation_is_a_conflict() {
        let error: AppError = PatientError::EvaluationExists.into();
        assert_matches!(error, AppError::Conflict(_));
    }
}
