use std::sync::Arc;

use tracing::{info, instrument, warn};

use shared_config::AppConfig;

use crate::models::{AppointmentNotice, EmailMessage, NotificationOutcome};
use crate::services::mailer::{mailer_from_config, Mailer};
use crate::services::templates::{self, ClinicBranding};

const NO_PATIENT_EMAIL: &str = "No hay email del paciente";
const SEND_FAILED: &str = "No se pudo enviar correo";

/// Appointment e-mails. Failures are reported in the outcome, never raised.
pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
    branding: ClinicBranding,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_mailer(config, mailer_from_config(config))
    }

    pub fn with_mailer(config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            branding: ClinicBranding::from_config(config),
        }
    }

    pub(crate) async fn deliver(&self, message: EmailMessage) -> NotificationOutcome {
        match self.mailer.send(&message).await {
            Ok(()) => NotificationOutcome::sent(),
            Err(e) => {
                warn!(to = %message.to, error = %e, "e-mail delivery failed");
                NotificationOutcome::failed(SEND_FAILED)
            }
        }
    }

    fn recipient(notice: &AppointmentNotice) -> Option<&str> {
        notice
            .patient_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    #[instrument(skip(self, notice), fields(appointment_id = notice.appointment_id))]
    pub async fn appointment_confirmation(
        &self,
        notice: &AppointmentNotice,
    ) -> NotificationOutcome {
        let Some(to) = Self::recipient(notice) else {
            warn!("no patient e-mail for confirmation");
            return NotificationOutcome::failed(NO_PATIENT_EMAIL);
        };

        let outcome = self
            .deliver(templates::appointment_confirmation(&self.branding, notice, to))
            .await;
        if outcome.enviado {
            info!("confirmation e-mail sent to {}", to);
        }
        outcome
    }

    #[instrument(skip(self, notice), fields(appointment_id = notice.appointment_id))]
    pub async fn appointment_cancellation(
        &self,
        notice: &AppointmentNotice,
    ) -> NotificationOutcome {
        let Some(to) = Self::recipient(notice) else {
            warn!("no patient e-mail for cancellation");
            return NotificationOutcome::failed(NO_PATIENT_EMAIL);
        };

        let outcome = self
            .deliver(templates::appointment_cancellation(&self.branding, notice, to))
            .await;
        if outcome.enviado {
            info!("cancellation e-mail sent to {}", to);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationError;
    use crate::services::mailer::MockMailer;
    use chrono::Utc;
    use shared_utils::test_utils::TestConfig;

    fn notice(email: Option<&str>) -> AppointmentNotice {
        AppointmentNotice {
            appointment_id: 7,
            patient_name: Some("Ana".to_string()),
            patient_email: email.map(str::to_string),
            starts_at: Utc::now(),
            dentist_name: None,
            service_name: None,
            price: None,
            confirmation_url: None,
            cancellation_reason: None,
        }
    }

    #[tokio::test]
    async fn confirmation_goes_to_patient() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|message| {
                message.to == "ana@example.com" && message.subject.contains("Confirmación")
            })
            .times(1)
            .returning(|_| Ok(()));

        let config = TestConfig::default().to_app_config();
        let service = NotificationService::with_mailer(&config, Arc::new(mailer));
        let outcome = service.appointment_confirmation(&notice(Some("ana@example.com"))).await;

        assert_eq!(outcome, NotificationOutcome::sent());
    }

    #[tokio::test]
    async fn missing_email_is_reported_without_sending() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let config = TestConfig::default().to_app_config();
        let service = NotificationService::with_mailer(&config, Arc::new(mailer));
        let outcome = service.appointment_cancellation(&notice(Some("  "))).await;

        assert_eq!(outcome, NotificationOutcome::failed("No hay email del paciente"));
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(NotificationError::Transport("connection refused".to_string())));

        let config = TestConfig::default().to_app_config();
        let service = NotificationService::with_mailer(&config, Arc::new(mailer));
        let outcome = service.appointment_confirmation(&notice(Some("ana@example.com"))).await;

        assert!(!outcome.enviado);
        assert_eq!(outcome.error.as_deref(), Some("No se pudo enviar correo"));
    }
}
