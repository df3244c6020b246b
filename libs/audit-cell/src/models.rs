use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::pagination::Page;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditAction {
    #[serde(rename = "crear")]
    Create,
    #[serde(rename = "editar")]
    Update,
    #[serde(rename = "eliminar")]
    Delete,
    #[serde(rename = "ver")]
    View,
    #[serde(rename = "login")]
    Login,
    #[serde(rename = "logout")]
    Logout,
    #[serde(rename = "reservar")]
    Reserve,
    #[serde(rename = "confirmar")]
    Confirm,
    #[serde(rename = "completar")]
    Complete,
    #[serde(rename = "cancelar")]
    Cancel,
    #[serde(rename = "firmar")]
    Sign,
    #[serde(rename = "aceptar")]
    Accept,
    #[serde(rename = "exportar")]
    Export,
    #[serde(rename = "importar")]
    Import,
    #[serde(rename = "acceso_denegado")]
    AccessDenied,
    #[serde(rename = "otro")]
    Other,
}

impl AuditAction {
    pub const ALL: [AuditAction; 16] = [
        AuditAction::Create,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::View,
        AuditAction::Login,
        AuditAction::Logout,
        AuditAction::Reserve,
        AuditAction::Confirm,
        AuditAction::Complete,
        AuditAction::Cancel,
        AuditAction::Sign,
        AuditAction::Accept,
        AuditAction::Export,
        AuditAction::Import,
        AuditAction::AccessDenied,
        AuditAction::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "crear",
            AuditAction::Update => "editar",
            AuditAction::Delete => "eliminar",
            AuditAction::View => "ver",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::Reserve => "reservar",
            AuditAction::Confirm => "confirmar",
            AuditAction::Complete => "completar",
            AuditAction::Cancel => "cancelar",
            AuditAction::Sign => "firmar",
            AuditAction::Accept => "aceptar",
            AuditAction::Export => "exportar",
            AuditAction::Import => "importar",
            AuditAction::AccessDenied => "acceso_denegado",
            AuditAction::Other => "otro",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuditAction::Create => "Crear",
            AuditAction::Update => "Editar",
            AuditAction::Delete => "Eliminar",
            AuditAction::View => "Ver",
            AuditAction::Login => "Inicio de sesión",
            AuditAction::Logout => "Cierre de sesión",
            AuditAction::Reserve => "Reservar",
            AuditAction::Confirm => "Confirmar",
            AuditAction::Complete => "Completar",
            AuditAction::Cancel => "Cancelar",
            AuditAction::Sign => "Firmar",
            AuditAction::Accept => "Aceptar",
            AuditAction::Export => "Exportar",
            AuditAction::Import => "Importar",
            AuditAction::AccessDenied => "Acceso denegado",
            AuditAction::Other => "Otro",
        }
    }

    /// Actions offered as browse filters.
    pub fn is_filterable(&self) -> bool {
        !matches!(
            self,
            AuditAction::Logout
                | AuditAction::AccessDenied
                | AuditAction::Import
                | AuditAction::Other
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditModule {
    #[serde(rename = "citas")]
    Appointments,
    #[serde(rename = "clientes")]
    Clients,
    #[serde(rename = "personal")]
    Staff,
    #[serde(rename = "salas")]
    Rooms,
    #[serde(rename = "odontogramas")]
    Odontograms,
    #[serde(rename = "radiografias")]
    Radiographs,
    #[serde(rename = "consentimientos")]
    Consents,
    #[serde(rename = "tratamientos")]
    Treatments,
    #[serde(rename = "evaluaciones")]
    Evaluations,
    #[serde(rename = "auditoria")]
    Audit,
    #[serde(rename = "configuracion")]
    Settings,
    #[serde(rename = "sistema")]
    System,
    #[serde(rename = "otro")]
    Other,
}

impl AuditModule {
    pub const ALL: [AuditModule; 13] = [
        AuditModule::Appointments,
        AuditModule::Clients,
        AuditModule::Staff,
        AuditModule::Rooms,
        AuditModule::Odontograms,
        AuditModule::Radiographs,
        AuditModule::Consents,
        AuditModule::Treatments,
        AuditModule::Evaluations,
        AuditModule::Audit,
        AuditModule::Settings,
        AuditModule::System,
        AuditModule::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditModule::Appointments => "citas",
            AuditModule::Clients => "clientes",
            AuditModule::Staff => "personal",
            AuditModule::Rooms => "salas",
            AuditModule::Odontograms => "odontogramas",
            AuditModule::Radiographs => "radiografias",
            AuditModule::Consents => "consentimientos",
            AuditModule::Treatments => "tratamientos",
            AuditModule::Evaluations => "evaluaciones",
            AuditModule::Audit => "auditoria",
            AuditModule::Settings => "configuracion",
            AuditModule::System => "sistema",
            AuditModule::Other => "otro",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuditModule::Appointments => "Citas",
            AuditModule::Clients => "Clientes",
            AuditModule::Staff => "Personal",
            AuditModule::Rooms => "Salas",
            AuditModule::Odontograms => "Odontogramas",
            AuditModule::Radiographs => "Radiografías",
            AuditModule::Consents => "Consentimientos",
            AuditModule::Treatments => "Tratamientos",
            AuditModule::Evaluations => "Evaluaciones",
            AuditModule::Audit => "Auditoría",
            AuditModule::Settings => "Configuración",
            AuditModule::System => "Sistema",
            AuditModule::Other => "Otro",
        }
    }

    pub fn is_filterable(&self) -> bool {
        !matches!(
            self,
            AuditModule::Settings | AuditModule::System | AuditModule::Other | AuditModule::Audit
        )
    }
}

/// A persisted audit log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub action: AuditAction,
    pub module: AuditModule,
    pub description: String,
    pub details: Option<String>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub ip_address: Option<String>,
}

/// An audit entry about to be written.
#[derive(Debug, Clone, Serialize)]
pub struct NewAuditEntry {
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub action: AuditAction,
    pub module: AuditModule,
    pub description: String,
    pub details: Option<String>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub ip_address: Option<String>,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction, module: AuditModule, description: impl Into<String>) -> Self {
        Self {
            occurred_at: Utc::now(),
            actor_id: None,
            actor_name: None,
            action,
            module,
            description: description.into(),
            details: None,
            object_type: None,
            object_id: None,
            ip_address: None,
        }
    }

    pub fn with_actor(mut self, actor: &Actor) -> Self {
        self.actor_id = actor.user_id();
        self.actor_name = actor.display_name();
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_object(mut self, object_type: &str, object_id: impl ToString) -> Self {
        self.object_type = Some(object_type.to_string());
        self.object_id = Some(object_id.to_string());
        self
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilters {
    pub modulo: Option<AuditModule>,
    pub accion: Option<AuditAction>,
    pub usuario: Option<String>,
    pub buscar: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountByKey {
    pub key: &'static str,
    pub label: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// A staff member the log can be filtered by; `user_id` matches `actor_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorOption {
    pub user_id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    pub total: u64,
    pub today: u64,
    pub this_month: u64,
    pub by_module: Vec<CountByKey>,
    pub by_action: Vec<CountByKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditBrowse {
    pub entries: Page<AuditEntry>,
    pub summary: AuditSummary,
    pub modules: Vec<FilterOption>,
    pub actions: Vec<FilterOption>,
    pub users: Vec<ActorOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditStatistics {
    pub total: u64,
    pub today: u64,
    pub last_7_days: u64,
    pub last_30_days: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub estimated_size_mb: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearAuditRequest {
    #[serde(default)]
    pub confirmar: bool,
    #[serde(default)]
    pub eliminar_todo: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearOutcome {
    pub message: String,
    pub total_antes: u64,
    pub total_despues: u64,
    pub eliminados: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurgeRequest {
    #[serde(default = "PurgeRequest::default_days")]
    pub dias: i64,
    #[serde(default = "PurgeRequest::default_max_records")]
    pub max_registros: u64,
    #[serde(default)]
    pub dry_run: bool,
}

impl PurgeRequest {
    pub const MIN_DAYS: i64 = 30;
    pub const MIN_RECORDS: u64 = 10_000;

    fn default_days() -> i64 {
        365
    }

    fn default_max_records() -> u64 {
        100_000
    }
}

impl Default for PurgeRequest {
    fn default() -> Self {
        Self {
            dias: Self::default_days(),
            max_registros: Self::default_max_records(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub dry_run: bool,
    pub total_before: u64,
    pub removed_by_limit: u64,
    pub removed_by_age: u64,
    pub total_after: u64,
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Debe confirmar la eliminación marcando el checkbox.")]
    ConfirmationRequired,

    #[error("Debe mantener al menos {0} días de historial.")]
    RetentionTooShort(i64),

    #[error("Debe mantener al menos {0} registros.")]
    RecordLimitTooLow(u64),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AuditError> for AppError {
    fn from(error: AuditError) -> Self {
        match error {
            AuditError::ConfirmationRequired
            | AuditError::RetentionTooShort(_)
            | AuditError::RecordLimitTooLow(_) => AppError::BadRequest(error.to_string()),
            AuditError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

/// Rough on-disk footprint: ~750 bytes per row.
pub fn estimated_size_mb(total: u64) -> f64 {
    let mb = (total as f64 * 750.0) / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for action in AuditAction::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
        for module in AuditModule::ALL {
            let json = serde_json::to_string(&module).unwrap();
            assert_eq!(json, format!("\"{}\"", module.as_str()));
        }
    }

    #[test]
    fn filter_lists_hide_internal_values() {
        let modules: Vec<_> = AuditModule::ALL.iter().filter(|m| m.is_filterable()).collect();
        assert_eq!(modules.len(), 9);
        assert!(!AuditAction::AccessDenied.is_filterable());
        assert!(AuditAction::Reserve.is_filterable());
    }

    #[test]
    fn size_estimate_rounds_to_two_places() {
        assert_eq!(estimated_size_mb(0), 0.0);
        assert_eq!(estimated_size_mb(100_000), 71.53);
    }
}
