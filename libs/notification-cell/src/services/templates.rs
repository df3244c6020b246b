//! Plain-text and HTML bodies for the clinic's e-mails.

use chrono_tz::Tz;

use shared_config::AppConfig;
use shared_utils::formatting::{format_local_datetime, format_price};

use crate::models::{AppointmentNotice, EmailMessage};

#[derive(Debug, Clone)]
pub struct ClinicBranding {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub map_url: String,
    pub timezone: Tz,
}

impl ClinicBranding {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            name: config.clinic_name.clone(),
            address: config.clinic_address.clone(),
            phone: config.clinic_phone.clone(),
            email: config.clinic_email.clone(),
            map_url: config.clinic_map_url.clone(),
            timezone: config.clinic_timezone,
        }
    }

    fn contact_lines(&self) -> String {
        let mut lines = Vec::new();
        if !self.address.is_empty() {
            lines.push(format!("Dirección: {}", self.address));
        }
        if !self.map_url.is_empty() {
            lines.push(format!("Cómo llegar: {}", self.map_url));
        }
        if !self.phone.is_empty() {
            lines.push(format!("Teléfono: {}", self.phone));
        }
        if !self.email.is_empty() {
            lines.push(format!("Email: {}", self.email));
        }
        lines.join("\n")
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn detail_lines(
    branding: &ClinicBranding,
    notice: &AppointmentNotice,
) -> Vec<(&'static str, String)> {
    let mut details = vec![(
        "Fecha y hora",
        format_local_datetime(notice.starts_at, branding.timezone),
    )];
    if let Some(dentist) = &notice.dentist_name {
        details.push(("Dentista", dentist.clone()));
    }
    if let Some(service) = &notice.service_name {
        details.push(("Servicio", service.clone()));
    }
    if let Some(price) = notice.price {
        details.push(("Valor", format_price(price)));
    }
    details
}

fn html_document(
    branding: &ClinicBranding,
    heading: &str,
    intro: &str,
    details: &[(&str, String)],
    footer: &str,
) -> String {
    let rows: String = details
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><td style=\"padding:4px 12px 4px 0\"><strong>{}</strong></td><td>{}</td></tr>",
                label,
                escape_html(value)
            )
        })
        .collect();

    format!(
        "<html><body style=\"font-family:Arial,sans-serif\">\
         <h2>{}</h2><p>{}</p><table>{}</table><p>{}</p>\
         <p style=\"color:#666\">{}</p></body></html>",
        escape_html(heading),
        intro,
        rows,
        footer,
        escape_html(&branding.contact_lines()).replace('\n', "<br>")
    )
}

pub fn appointment_confirmation(
    branding: &ClinicBranding,
    notice: &AppointmentNotice,
    to: &str,
) -> EmailMessage {
    let greeting = notice.patient_name.as_deref().unwrap_or("paciente");
    let details = detail_lines(branding, notice);

    let mut text = format!(
        "Hola {},\n\nTu cita en {} ha sido reservada.\n\n",
        greeting, branding.name
    );
    for (label, value) in &details {
        text.push_str(&format!("{}: {}\n", label, value));
    }
    if let Some(url) = &notice.confirmation_url {
        text.push_str(&format!("\nConfirma tu asistencia aquí: {}\n", url));
    }
    text.push_str(&format!("\n{}\n\nSaludos,\nEquipo {}", branding.contact_lines(), branding.name));

    let footer = match &notice.confirmation_url {
        Some(url) => format!(
            "<a href=\"{}\">Confirmar asistencia</a>",
            escape_html(url)
        ),
        None => String::new(),
    };

    EmailMessage {
        to: to.to_string(),
        subject: format!("{} - Confirmación de cita", branding.name),
        html_body: Some(html_document(
            branding,
            "Cita reservada",
            &format!("Hola {}, tu cita ha sido reservada.", escape_html(greeting)),
            &details,
            &footer,
        )),
        text_body: text,
    }
}

pub fn appointment_cancellation(
    branding: &ClinicBranding,
    notice: &AppointmentNotice,
    to: &str,
) -> EmailMessage {
    let greeting = notice.patient_name.as_deref().unwrap_or("paciente");
    let mut details = detail_lines(branding, notice);
    if let Some(reason) = &notice.cancellation_reason {
        details.push(("Motivo", reason.clone()));
    }

    let mut text = format!(
        "Hola {},\n\nTu cita en {} ha sido cancelada.\n\n",
        greeting, branding.name
    );
    for (label, value) in &details {
        text.push_str(&format!("{}: {}\n", label, value));
    }
    text.push_str(&format!(
        "\nSi deseas reagendar, contáctanos.\n\n{}\n\nSaludos,\nEquipo {}",
        branding.contact_lines(),
        branding.name
    ));

    EmailMessage {
        to: to.to_string(),
        subject: format!("{} - Cita cancelada", branding.name),
        html_body: Some(html_document(
            branding,
            "Cita cancelada",
            &format!("Hola {}, tu cita ha sido cancelada.", escape_html(greeting)),
            &details,
            "Si deseas reagendar, contáctanos.",
        )),
        text_body: text,
    }
}

pub fn verification_code(
    branding: &ClinicBranding,
    code: &str,
    to: &str,
    valid_minutes: i64,
) -> EmailMessage {
    let text = format!(
        "Hola!\n\nTu código de verificación es: {code}\n\n\
         Este código expira en {valid_minutes} minutos.\n\n\
         No compartas este código con nadie.\n\n\
         Gracias por registrarte en {name}!\n\nSaludos,\nEquipo {name}",
        code = code,
        valid_minutes = valid_minutes,
        name = branding.name
    );

    let html = format!(
        "<html><body><h2>Código de Verificación</h2>\
         <p>Tu código de verificación es: <strong>{}</strong></p>\
         <p>Este código expira en {} minutos.</p>\
         <p>No compartas este código con nadie.</p>\
         <p>Gracias por registrarte en {}!</p></body></html>",
        code,
        valid_minutes,
        escape_html(&branding.name)
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("{} - Código de Verificación", branding.name),
        text_body: text,
        html_body: Some(html),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared_utils::test_utils::TestConfig;

    fn notice() -> AppointmentNotice {
        AppointmentNotice {
            appointment_id: 5,
            patient_name: Some("Ana <Pérez>".to_string()),
            patient_email: Some("ana@example.com".to_string()),
            starts_at: Utc.with_ymd_and_hms(2025, 1, 15, 13, 30, 0).unwrap(),
            dentist_name: Some("Dra. Carla Soto".to_string()),
            service_name: Some("Limpieza dental".to_string()),
            price: Some(25000),
            confirmation_url: Some(
                "http://localhost:3000/appointments/5/confirm?token=abc".to_string(),
            ),
            cancellation_reason: None,
        }
    }

    #[test]
    fn confirmation_mentions_local_time_price_and_link() {
        let branding = ClinicBranding::from_config(&TestConfig::default().to_app_config());
        let email = appointment_confirmation(&branding, &notice(), "ana@example.com");

        assert_eq!(email.subject, "Clínica Dental San Felipe - Confirmación de cita");
        assert!(email.text_body.contains("15/01/2025 10:30"));
        assert!(email.text_body.contains("$25,000"));
        assert!(email.text_body.contains("token=abc"));
        let html = email.html_body.unwrap();
        assert!(html.contains("Ana &lt;Pérez&gt;"));
        assert!(!html.contains("<Pérez>"));
    }

    #[test]
    fn cancellation_includes_reason() {
        let branding = ClinicBranding::from_config(&TestConfig::default().to_app_config());
        let mut notice = notice();
        notice.cancellation_reason = Some("Dentista con licencia".to_string());

        let email = appointment_cancellation(&branding, &notice, "ana@example.com");
        assert!(email.text_body.contains("Motivo: Dentista con licencia"));
    }
}
