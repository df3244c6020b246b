use std::env;

use chrono_tz::Tz;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub server_port: u16,
    pub site_url: String,
    pub clinic_name: String,
    pub clinic_address: String,
    pub clinic_phone: String,
    pub clinic_email: String,
    pub clinic_map_url: String,
    pub clinic_timezone: Tz,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from: String,
    pub storage_bucket: String,
}

fn required(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn with_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using default", name);
        default.to_string()
    })
}

fn port(name: &str, default: u16) -> u16 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid port ({}), using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let timezone_name = with_default("CLINIC_TIMEZONE", "America/Santiago");
        let clinic_timezone = timezone_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!("CLINIC_TIMEZONE {} is unknown, using America/Santiago", timezone_name);
            chrono_tz::America::Santiago
        });

        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            server_port: port("SERVER_PORT", 3000),
            site_url: with_default("SITE_URL", "http://localhost:3000"),
            clinic_name: with_default("CLINIC_NAME", "Clínica Dental San Felipe"),
            clinic_address: env::var("CLINIC_ADDRESS").unwrap_or_default(),
            clinic_phone: env::var("CLINIC_PHONE").unwrap_or_default(),
            clinic_email: env::var("CLINIC_EMAIL").unwrap_or_default(),
            clinic_map_url: env::var("CLINIC_MAP_URL").unwrap_or_default(),
            clinic_timezone,
            smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port: port("SMTP_PORT", 587),
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            email_from: with_default("EMAIL_FROM", "no-reply@clinica-dental.local"),
            storage_bucket: with_default("STORAGE_BUCKET", "clinical-documents"),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if !config.is_email_configured() {
            warn!("SMTP not configured - e-mails will only be logged");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.smtp_host.is_empty()
            && !self.smtp_username.is_empty()
            && !self.smtp_password.is_empty()
    }
}
