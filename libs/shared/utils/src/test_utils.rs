use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            server_port: 3000,
            site_url: "http://localhost:3000".to_string(),
            clinic_name: "Clínica Dental San Felipe".to_string(),
            clinic_address: "Av. Principal 123, San Felipe".to_string(),
            clinic_phone: "+56 34 2123456".to_string(),
            clinic_email: "contacto@clinica.test".to_string(),
            clinic_map_url: String::new(),
            clinic_timezone: chrono_tz::America::Santiago,
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            email_from: "no-reply@clinica.test".to_string(),
            storage_bucket: "clinical-documents".to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "authenticated")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn dentist(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows shaped like the clinic tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn staff_profile_response(id: i64, user_id: &str, role: &str) -> Value {
        json!({
            "id": id,
            "user_id": user_id,
            "full_name": if role == "dentista" { "Dra. Carla Soto" } else { "Pedro Admin" },
            "email": format!("staff{}@clinica.test", id),
            "phone": "+56911112222",
            "role": role,
            "specialty": if role == "dentista" { Value::from("Ortodoncia") } else { Value::Null },
            "license_number": if role == "dentista" { Value::from("COL-123") } else { Value::Null },
            "room_id": null,
            "active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_account_response(id: i64, user_id: &str, email: &str) -> Value {
        json!({
            "id": id,
            "user_id": user_id,
            "full_name": "Ana Pérez",
            "email": email,
            "phone": "+56987654321",
            "rut": "12.345.678-9",
            "active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn client_response(id: i64, email: &str) -> Value {
        json!({
            "id": id,
            "full_name": "Ana Pérez",
            "email": email,
            "phone": "+56987654321",
            "rut": "12.345.678-9",
            "birth_date": null,
            "allergies": null,
            "active": true,
            "assigned_dentist_id": null,
            "registered_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(id: i64, status: &str, starts_at: &str) -> Value {
        json!({
            "id": id,
            "starts_at": starts_at,
            "status": status,
            "client_id": null,
            "dentist_id": 10,
            "service_type_id": 3,
            "consultation_type": "Limpieza",
            "patient_name": null,
            "patient_email": null,
            "patient_phone": null,
            "charged_price": null,
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "dentist": {
                "id": 10,
                "full_name": "Dra. Carla Soto",
                "email": "carla@clinica.test",
                "specialty": "Ortodoncia",
                "license_number": "COL-123"
            },
            "service_type": {
                "id": 3,
                "name": "Limpieza dental",
                "category": "preventivo",
                "base_price": 25000,
                "estimated_duration_minutes": 45
            },
            "client": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(!app_config.is_email_configured());
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
