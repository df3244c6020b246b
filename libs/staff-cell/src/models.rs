use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::auth::StaffRole;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffProfile {
    pub id: i64,
    pub user_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: StaffRole,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub room_id: Option<i64>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomSummary>,
}

impl StaffProfile {
    pub fn is_dentist(&self) -> bool {
        self.role == StaffRole::Dentista
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
}

/// Treatment room (Sala).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStaffProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomQuery {
    pub search: Option<String>,
    /// `activa` or `inactiva`.
    pub estado: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomRequest {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default = "default_active")]
    pub activa: bool,
}

impl RoomRequest {
    pub const MIN_NAME_CHARS: usize = 2;

    /// Trimmed name, checked for presence and minimum length.
    pub fn validated_name(&self) -> Result<String, StaffError> {
        let name = self.nombre.trim();
        if name.is_empty() {
            return Err(StaffError::RoomNameRequired);
        }
        if name.chars().count() < Self::MIN_NAME_CHARS {
            return Err(StaffError::RoomNameTooShort);
        }
        Ok(name.to_string())
    }

    pub fn description(&self) -> Option<String> {
        self.descripcion
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoomRequest {
    #[serde(default)]
    pub sala_id: Value,
}

impl AssignRoomRequest {
    /// `None` means unassign. Accepts a number, a numeric string, `""`, `"null"` or null.
    pub fn target_room(&self) -> Result<Option<i64>, StaffError> {
        match &self.sala_id {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| StaffError::Validation("sala_id inválido".to_string())),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() || s == "null" {
                    Ok(None)
                } else {
                    s.parse()
                        .map(Some)
                        .map_err(|_| StaffError::Validation("sala_id inválido".to_string()))
                }
            }
            _ => Err(StaffError::Validation("sala_id inválido".to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomTotals {
    pub total: u64,
    pub activas: u64,
    pub inactivas: u64,
    pub dentistas_con_sala: usize,
    pub dentistas_sin_sala: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomOverview {
    pub salas: Vec<Room>,
    pub dentistas: Vec<StaffProfile>,
    pub salas_activas: Vec<Room>,
    pub totales: RoomTotals,
}

#[derive(Debug, Error)]
pub enum StaffError {
    #[error("Perfil no encontrado")]
    ProfileNotFound,

    #[error("Dentista no encontrado")]
    DentistNotFound,

    #[error("Sala no encontrada")]
    RoomNotFound,

    #[error("La sala no existe o está inactiva")]
    InactiveRoom,

    #[error("El nombre de la sala es obligatorio.")]
    RoomNameRequired,

    #[error("El nombre de la sala debe tener al menos 2 caracteres.")]
    RoomNameTooShort,

    #[error("Ya existe una sala con el nombre \"{0}\".")]
    DuplicateRoomName(String),

    #[error(
        "No se puede eliminar la sala \"{name}\" porque tiene {dentists} dentista(s) asignado(s). \
         Primero debe reasignar los dentistas a otras salas."
    )]
    RoomInUse { name: String, dentists: u64 },

    #[error("El teléfono debe tener 8 dígitos (formato +569XXXXXXXX)")]
    InvalidPhone,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StaffError> for AppError {
    fn from(error: StaffError) -> Self {
        match error {
            StaffError::ProfileNotFound
            | StaffError::DentistNotFound
            | StaffError::RoomNotFound => AppError::NotFound(error.to_string()),
            StaffError::InactiveRoom
            | StaffError::RoomNameRequired
            | StaffError::RoomNameTooShort
            | StaffError::DuplicateRoomName(_)
            | StaffError::RoomInUse { .. }
            | StaffError::InvalidPhone
            | StaffError::Validation(_) => AppError::BadRequest(error.to_string()),
            StaffError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
