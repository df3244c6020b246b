use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

pub const DEFAULT_SPECIALTY: &str = "Odontología General";
pub const DEFAULT_LICENSE: &str = "N/A";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Disponible,
    Reservada,
    Confirmada,
    Completada,
    Cancelada,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Disponible,
        AppointmentStatus::Reservada,
        AppointmentStatus::Confirmada,
        AppointmentStatus::Completada,
        AppointmentStatus::Cancelada,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Disponible => "disponible",
            AppointmentStatus::Reservada => "reservada",
            AppointmentStatus::Confirmada => "confirmada",
            AppointmentStatus::Completada => "completada",
            AppointmentStatus::Cancelada => "cancelada",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Disponible => "Disponible",
            AppointmentStatus::Reservada => "Reservada",
            AppointmentStatus::Confirmada => "Confirmada",
            AppointmentStatus::Completada => "Completada",
            AppointmentStatus::Cancelada => "Cancelada",
        }
    }

    /// Reserved or confirmed: the patient holds this slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Reservada | AppointmentStatus::Confirmada)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| AppointmentError::ValidationError(format!("Estado desconocido: {}", s)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DentistSummary {
    pub id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTypeSummary {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub base_price: i64,
    pub estimated_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A bookable slot and, once reserved, the booking itself (Cita).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub starts_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub client_id: Option<i64>,
    pub dentist_id: Option<i64>,
    pub service_type_id: Option<i64>,
    pub consultation_type: Option<String>,
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub charged_price: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub dentist: Option<DentistSummary>,
    #[serde(default)]
    pub service_type: Option<ServiceTypeSummary>,
    #[serde(default)]
    pub client: Option<ClientSummary>,
}

impl Appointment {
    /// Charged price when set, otherwise the service's base price.
    pub fn effective_price(&self) -> Option<i64> {
        self.charged_price
            .or_else(|| self.service_type.as_ref().map(|s| s.base_price))
    }

    pub fn patient_display_name(&self) -> Option<&str> {
        self.patient_name
            .as_deref()
            .or_else(|| self.client.as_ref().map(|c| c.full_name.as_str()))
    }

    pub fn contact_email(&self) -> Option<&str> {
        self.patient_email
            .as_deref()
            .or_else(|| self.client.as_ref().map(|c| c.email.as_str()))
            .filter(|email| !email.trim().is_empty())
    }

    /// Lowercased text the staff search matches against.
    pub(crate) fn search_haystack(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(client) = &self.client {
            parts.push(&client.full_name);
            parts.push(&client.email);
            if let Some(phone) = &client.phone {
                parts.push(phone);
            }
        }
        parts.extend(self.patient_name.as_deref());
        parts.extend(self.patient_email.as_deref());
        parts.extend(self.service_type.as_ref().map(|s| s.name.as_str()));
        parts.extend(self.consultation_type.as_deref());
        parts.extend(self.dentist.as_ref().map(|d| d.full_name.as_str()));
        parts.extend(self.notes.as_deref());
        parts.join("\n").to_lowercase()
    }
}

/// Service catalogue entry (TipoServicio).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub base_price: i64,
    pub estimated_duration_minutes: Option<i32>,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    pub cita_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelRequest {
    pub motivo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmQuery {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSlotRequest {
    pub fecha_hora: DateTime<Utc>,
    pub dentista_id: i64,
    pub tipo_servicio_id: i64,
    pub tipo_consulta: Option<String>,
    pub precio_cobrado: Option<i64>,
    pub notas: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableFilters {
    pub tipo_consulta: Option<String>,
    pub fecha: Option<String>,
    pub dentista_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotsQuery {
    pub fecha: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientAppointmentsQuery {
    #[serde(default)]
    pub incluir_completadas: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffListFilters {
    /// One status or a comma separated list.
    pub estado: Option<String>,
    pub buscar: Option<String>,
    pub fecha: Option<String>,
    #[serde(default)]
    pub excluir_canceladas: bool,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub nombre: String,
    pub precio: Option<i64>,
    pub precio_formateado: Option<String>,
    pub duracion_estimada: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DentistInfo {
    pub nombre: String,
    pub especialidad: String,
    pub numero_colegio: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableAppointment {
    pub id: i64,
    pub fecha_hora: DateTime<Utc>,
    pub fecha_hora_local: String,
    pub tipo_consulta: Option<String>,
    pub servicio_info: Option<ServiceInfo>,
    pub dentista_info: Option<DentistInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateSlot {
    pub id: i64,
    pub fecha_hora: String,
    pub hora: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffAppointmentRow {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub has_record: bool,
    pub odontogram_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentStats {
    pub citas_hoy: u64,
    pub disponibles: u64,
    pub realizadas: u64,
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Cita no encontrada")]
    NotFound,

    #[error("Cliente no encontrado")]
    ClientNotFound,

    #[error("Esta cita ya no está disponible")]
    SlotNotAvailable,

    #[error("La cita cambió de estado mientras se procesaba; vuelva a intentarlo")]
    StaleStatus,

    #[error("Ya tienes una cita activa. Solo puedes reservar una cita a la vez.")]
    ActiveAppointmentExists,

    #[error("No se puede pasar de {from} a {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Cita no reservada")]
    NotReserved,

    #[error("Enlace de confirmación inválido")]
    InvalidConfirmationToken,

    #[error("No tienes permiso para modificar esta cita")]
    Unauthorized,

    #[error("El dentista ya tiene una cita a esa hora")]
    DuplicateSlot,

    #[error("{0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound | AppointmentError::ClientNotFound => {
                AppError::NotFound(error.to_string())
            }
            AppointmentError::SlotNotAvailable
            | AppointmentError::StaleStatus
            | AppointmentError::ActiveAppointmentExists
            | AppointmentError::DuplicateSlot => AppError::Conflict(error.to_string()),
            AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::NotReserved
            | AppointmentError::ValidationError(_) => AppError::BadRequest(error.to_string()),
            AppointmentError::InvalidConfirmationToken | AppointmentError::Unauthorized => {
                AppError::Forbidden(error.to_string())
            }
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_utils::test_utils::MockSupabaseResponses;

    #[test]
    fn status_parses_from_wire_names() {
        for status in AppointmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), status);
            assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
        }
        assert!("pendiente".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn price_falls_back_to_service_base_price() {
        let mut appointment: Appointment = serde_json::from_value(
            MockSupabaseResponses::appointment_response(1, "disponible", "2030-01-01T13:00:00Z"),
        )
        .unwrap();
        assert_eq!(appointment.effective_price(), Some(25000));

        appointment.charged_price = Some(18000);
        assert_eq!(appointment.effective_price(), Some(18000));
    }

    #[test]
    fn haystack_covers_dentist_and_service() {
        let appointment: Appointment = serde_json::from_value(
            MockSupabaseResponses::appointment_response(1, "reservada", "2030-01-01T13:00:00Z"),
        )
        .unwrap();
        let haystack = appointment.search_haystack();
        assert!(haystack.contains("carla soto"));
        assert!(haystack.contains("limpieza dental"));
    }
}
