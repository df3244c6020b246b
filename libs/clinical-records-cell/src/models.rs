use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

// ---------------------------------------------------------------------------
// Odontograms
// ---------------------------------------------------------------------------

/// PostgREST aggregate embed, e.g. `teeth(count)` → `[{"count": 32}]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddedCount {
    pub count: i64,
}

/// Dental chart (Odontograma) recorded at a visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Odontogram {
    pub id: i64,
    pub client_id: Option<i64>,
    pub appointment_id: Option<i64>,
    pub dentist_id: Option<i64>,
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub reason: Option<String>,
    pub general_state: Option<String>,
    pub oral_hygiene: Option<String>,
    pub treatment_plan: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub teeth: Vec<EmbeddedCount>,
}

impl Odontogram {
    pub fn total_teeth(&self) -> i64 {
        self.teeth.iter().map(|t| t.count).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OdontogramView {
    #[serde(flatten)]
    pub odontogram: Odontogram,
    pub total_dientes: i64,
}

impl From<Odontogram> for OdontogramView {
    fn from(odontogram: Odontogram) -> Self {
        let total_dientes = odontogram.total_teeth();
        Self {
            odontogram,
            total_dientes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOdontogramRequest {
    pub cliente_id: i64,
    pub cita_id: Option<i64>,
    pub motivo_consulta: String,
    pub estado_general: Option<String>,
    pub higiene_oral: Option<String>,
    pub plan_tratamiento: Option<String>,
}

// ---------------------------------------------------------------------------
// Radiographs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RadiographKind {
    Periapical,
    Bitewing,
    Panoramica,
    Oclusal,
    Cefalometrica,
    Otra,
}

impl RadiographKind {
    pub const ALL: [RadiographKind; 6] = [
        RadiographKind::Periapical,
        RadiographKind::Bitewing,
        RadiographKind::Panoramica,
        RadiographKind::Oclusal,
        RadiographKind::Cefalometrica,
        RadiographKind::Otra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RadiographKind::Periapical => "periapical",
            RadiographKind::Bitewing => "bitewing",
            RadiographKind::Panoramica => "panoramica",
            RadiographKind::Oclusal => "oclusal",
            RadiographKind::Cefalometrica => "cefalometrica",
            RadiographKind::Otra => "otra",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RadiographKind::Periapical => "Periapical",
            RadiographKind::Bitewing => "Bitewing",
            RadiographKind::Panoramica => "Panorámica",
            RadiographKind::Oclusal => "Oclusal",
            RadiographKind::Cefalometrica => "Cefalométrica",
            RadiographKind::Otra => "Otra",
        }
    }
}

impl FromStr for RadiographKind {
    type Err = ClinicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                ClinicalError::Validation(format!("Tipo de radiografía inválido: {}", s))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Radiograph {
    pub id: i64,
    pub client_id: Option<i64>,
    pub appointment_id: Option<i64>,
    pub dentist_id: Option<i64>,
    pub patient_email: Option<String>,
    pub kind: RadiographKind,
    pub description: Option<String>,
    pub storage_path: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl Radiograph {
    /// Attachment name offered on download, e.g. `radiografia_4_Panorámica.png`.
    pub fn download_filename(&self, content_type: &str) -> String {
        format!(
            "radiografia_{}_{}{}",
            self.id,
            self.kind.label().replace(' ', "_"),
            extension_for(content_type)
        )
    }
}

/// File extension (with dot) for a stored object's content type.
pub fn extension_for(content_type: &str) -> &'static str {
    let content_type = content_type.to_lowercase();
    if content_type.contains("png") {
        ".png"
    } else if content_type.contains("pdf") {
        ".pdf"
    } else {
        ".jpg"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRadiographRequest {
    pub cliente_id: i64,
    pub cita_id: Option<i64>,
    pub tipo: String,
    pub descripcion: Option<String>,
    /// Base64 payload, optionally prefixed with `data:<mime>;base64,`.
    pub imagen: String,
    pub content_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Consents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    Pendiente,
    Firmado,
    Rechazado,
    Vencido,
}

impl ConsentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::Pendiente => "pendiente",
            ConsentStatus::Firmado => "firmado",
            ConsentStatus::Rechazado => "rechazado",
            ConsentStatus::Vencido => "vencido",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConsentStatus::Pendiente => "Pendiente de Firma",
            ConsentStatus::Firmado => "Firmado",
            ConsentStatus::Rechazado => "Rechazado",
            ConsentStatus::Vencido => "Vencido",
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display name of a procedure kind; unknown kinds are shown as stored.
pub fn procedure_label(kind: &str) -> String {
    match kind {
        "endodoncia" => "Endodoncia",
        "extraccion" => "Extracción",
        "implante" => "Implante",
        "ortodoncia" => "Ortodoncia",
        "limpieza" => "Limpieza",
        "blanqueamiento" => "Blanqueamiento",
        "otro" => "Otro",
        other => other,
    }
    .to_string()
}

/// Informed consent (Consentimiento informado).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    pub id: i64,
    pub client_id: i64,
    pub treatment_plan_id: Option<i64>,
    pub dentist_id: Option<i64>,
    pub title: String,
    pub procedure_kind: String,
    pub status: ConsentStatus,
    pub content: Option<String>,
    pub diagnosis: Option<String>,
    pub procedure_nature: Option<String>,
    pub goals: Option<String>,
    pub risks: Option<String>,
    pub benefits: Option<String>,
    pub alternatives: Option<String>,
    pub prognosis: Option<String>,
    pub post_op_care: Option<String>,
    pub created_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
    pub expires_on: Option<NaiveDate>,
    pub signer_name: Option<String>,
    pub signer_rut: Option<String>,
    pub witness_name: Option<String>,
    pub witness_rut: Option<String>,
    #[serde(default)]
    pub understanding_declared: bool,
    #[serde(default)]
    pub revocation_acknowledged: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsentView {
    #[serde(flatten)]
    pub consent: Consent,
    pub estado_display: &'static str,
    pub tipo_display: String,
    pub puede_firmar: bool,
}

impl From<Consent> for ConsentView {
    fn from(consent: Consent) -> Self {
        Self {
            estado_display: consent.status.label(),
            tipo_display: procedure_label(&consent.procedure_kind),
            puede_firmar: consent.status == ConsentStatus::Pendiente,
            consent,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignConsentRequest {
    #[serde(default)]
    pub firma_paciente: String,
    pub nombre_firmante: Option<String>,
    pub rut_firmante: Option<String>,
    pub nombre_testigo: Option<String>,
    pub rut_testigo: Option<String>,
    pub firma_testigo: Option<String>,
    #[serde(default)]
    pub declaracion_comprension: bool,
    #[serde(default)]
    pub derecho_revocacion: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConsentRequest {
    pub cliente_id: i64,
    pub plan_tratamiento_id: Option<i64>,
    pub titulo: String,
    pub tipo_procedimiento: String,
    pub contenido: Option<String>,
    pub diagnostico: Option<String>,
    pub naturaleza_procedimiento: Option<String>,
    pub objetivos_tratamiento: Option<String>,
    pub riesgos: Option<String>,
    pub beneficios: Option<String>,
    pub alternativas: Option<String>,
    pub pronostico: Option<String>,
    pub cuidados_postoperatorios: Option<String>,
    pub fecha_vencimiento: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Treatment plans and budgets
// ---------------------------------------------------------------------------

/// Plan statuses after which a budget can no longer be accepted.
pub const CLOSED_PLAN_STATUSES: [&str; 3] = ["cancelado", "rechazado", "completado"];
pub const NEW_PLAN_STATUS: &str = "pendiente";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub id: i64,
    pub client_id: i64,
    pub dentist_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub budget_total: i64,
    #[serde(default)]
    pub discount: i64,
    pub final_price: i64,
    #[serde(default)]
    pub budget_accepted: bool,
    pub budget_accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TreatmentPlan {
    pub fn is_closed(&self) -> bool {
        CLOSED_PLAN_STATUSES.contains(&self.status.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanRequest {
    pub cliente_id: i64,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub presupuesto_total: i64,
    #[serde(default)]
    pub descuento: i64,
}

impl CreatePlanRequest {
    /// Final price after discount, once the amounts are consistent.
    pub fn final_price(&self) -> Result<i64, ClinicalError> {
        if self.nombre.trim().is_empty() {
            return Err(ClinicalError::Validation(
                "El nombre del plan es obligatorio".to_string(),
            ));
        }
        if self.presupuesto_total < 0 {
            return Err(ClinicalError::Validation(
                "El presupuesto no puede ser negativo".to_string(),
            ));
        }
        if self.descuento < 0 || self.descuento > self.presupuesto_total {
            return Err(ClinicalError::Validation(
                "El descuento debe estar entre 0 y el presupuesto total".to_string(),
            ));
        }
        Ok(self.presupuesto_total - self.descuento)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClinicalError {
    /// Missing, or not visible to the caller.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ClinicalError> for AppError {
    fn from(error: ClinicalError) -> Self {
        match error {
            ClinicalError::NotFound(_) => AppError::NotFound(error.to_string()),
            ClinicalError::Validation(msg) => AppError::BadRequest(msg),
            ClinicalError::Conflict(msg) => AppError::Conflict(msg),
            ClinicalError::Storage(msg) => AppError::ExternalService(msg),
            ClinicalError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
