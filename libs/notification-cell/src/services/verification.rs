use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::query_timestamp;
use shared_utils::validation::normalize_email;

use crate::models::{NotificationError, NotificationOutcome, VerificationCode};
use crate::services::mailer::{mailer_from_config, Mailer};
use crate::services::templates::{self, ClinicBranding};

pub const CODE_VALID_MINUTES: i64 = 15;

pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Issues and checks the 6-digit e-mail verification codes used at sign-up.
pub struct VerificationService {
    supabase: SupabaseClient,
    mailer: Arc<dyn Mailer>,
    branding: ClinicBranding,
}

impl VerificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_mailer(config, mailer_from_config(config))
    }

    pub fn with_mailer(config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            mailer,
            branding: ClinicBranding::from_config(config),
        }
    }

    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        raw_email: &str,
        now: DateTime<Utc>,
    ) -> Result<(VerificationCode, NotificationOutcome), NotificationError> {
        let email = normalize_email(raw_email).map_err(NotificationError::InvalidAddress)?;
        let record = VerificationCode {
            email: email.clone(),
            code: generate_code(),
            expires_at: now + Duration::minutes(CODE_VALID_MINUTES),
            used: false,
        };

        let body = serde_json::to_value(&record)
            .map_err(|e| NotificationError::Build(e.to_string()))?;
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/verification_codes",
                None,
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        let message =
            templates::verification_code(&self.branding, &record.code, &email, CODE_VALID_MINUTES);
        let outcome = match self.mailer.send(&message).await {
            Ok(()) => {
                info!("verification code sent to {}", email);
                NotificationOutcome::sent()
            }
            Err(e) => {
                warn!(error = %e, "verification code e-mail failed for {}", email);
                NotificationOutcome::failed("No se pudo enviar correo")
            }
        };

        Ok((record, outcome))
    }

    /// Consumes a matching, unexpired code. Returns whether one was found.
    #[instrument(skip(self, code))]
    pub async fn verify(
        &self,
        raw_email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, NotificationError> {
        let email = normalize_email(raw_email).map_err(NotificationError::InvalidAddress)?;
        let code = code.trim();
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let filter = format!(
            "email=eq.{}&code=eq.{}&used=eq.false&expires_at=gt.{}",
            urlencoding::encode(&email),
            code,
            query_timestamp(now)
        );

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/verification_codes?{}", filter),
                None,
                Some(json!({ "used": true })),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
