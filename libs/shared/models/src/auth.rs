use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Dentista,
    Administrativo,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Dentista => "dentista",
            StaffRole::Administrativo => "administrativo",
        }
    }
}

/// Clinic staff member resolved from the `staff_profiles` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffPrincipal {
    pub id: i64,
    pub user_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: StaffRole,
    pub active: bool,
}

impl StaffPrincipal {
    pub fn is_admin(&self) -> bool {
        self.role == StaffRole::Administrativo
    }

    pub fn is_dentist(&self) -> bool {
        self.role == StaffRole::Dentista
    }
}

/// Patient account resolved from the `client_accounts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientPrincipal {
    pub id: i64,
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub rut: Option<String>,
    pub active: bool,
}

impl PatientPrincipal {
    /// Login name recorded on reserved appointments.
    pub fn username(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Whoever made the request, for audit trails and ownership checks.
#[derive(Debug, Clone)]
pub enum Actor {
    Staff(StaffPrincipal),
    Patient(PatientPrincipal),
    Anonymous,
}

impl Actor {
    pub fn display_name(&self) -> Option<String> {
        match self {
            Actor::Staff(staff) => Some(staff.full_name.clone()),
            Actor::Patient(patient) => Some(patient.full_name.clone()),
            Actor::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<String> {
        match self {
            Actor::Staff(staff) => Some(staff.user_id.clone()),
            Actor::Patient(patient) => Some(patient.user_id.clone()),
            Actor::Anonymous => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_role_round_trips_lowercase() {
        let role: StaffRole = serde_json::from_str("\"administrativo\"").unwrap();
        assert_eq!(role, StaffRole::Administrativo);
        assert_eq!(role.as_str(), "administrativo");
    }

    #[test]
    fn username_is_email_local_part() {
        let patient = PatientPrincipal {
            id: 1,
            user_id: "u".into(),
            full_name: "Ana Pérez".into(),
            email: "ana.perez@example.com".into(),
            phone: None,
            rut: None,
            active: true,
        };
        assert_eq!(patient.username(), "ana.perez");
    }
}
