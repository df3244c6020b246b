use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// Outcome of a single e-mail attempt, as reported back to API callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationOutcome {
    pub enviado: bool,
    pub error: Option<String>,
}

impl NotificationOutcome {
    pub fn sent() -> Self {
        Self {
            enviado: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            enviado: false,
            error: Some(error.into()),
        }
    }
}

/// Everything the appointment e-mails need to know about a booking.
#[derive(Debug, Clone)]
pub struct AppointmentNotice {
    pub appointment_id: i64,
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub dentist_name: Option<String>,
    pub service_name: Option<String>,
    pub price: Option<i64>,
    pub confirmation_url: Option<String>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerificationCodeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Invalid e-mail address: {0}")]
    InvalidAddress(String),

    #[error("Could not build e-mail: {0}")]
    Build(String),

    #[error("Mail transport failed: {0}")]
    Transport(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<NotificationError> for AppError {
    fn from(error: NotificationError) -> Self {
        match error {
            NotificationError::InvalidAddress(msg) => AppError::ValidationError(msg),
            NotificationError::Build(msg) => AppError::Internal(msg),
            NotificationError::Transport(msg) => AppError::ExternalService(msg),
            NotificationError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
