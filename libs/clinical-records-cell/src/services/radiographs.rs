use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use patient_cell::services::ClientService;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, StoredObject};
use shared_models::auth::{Actor, StaffPrincipal};

use crate::models::{
    extension_for, ClinicalError, Radiograph, RadiographKind, UploadRadiographRequest,
};
use crate::services::scope::{client_error, PatientScope};

const RADIOGRAPHS: &str = "/rest/v1/radiographs";
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Splits an optional `data:<mime>;base64,` prefix off an upload payload.
fn split_data_url(payload: &str) -> (Option<&str>, &str) {
    match payload.split_once(";base64,") {
        Some((prefix, data)) => (prefix.strip_prefix("data:").filter(|m| !m.is_empty()), data),
        None => (None, payload),
    }
}

/// A stored radiograph ready to be sent as an attachment.
pub struct RadiographDownload {
    pub filename: String,
    pub object: StoredObject,
}

pub struct RadiographService {
    supabase: SupabaseClient,
    clients: ClientService,
    audit: AuditService,
    bucket: String,
}

impl RadiographService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clients: ClientService::new(config),
            audit: AuditService::new(config),
            bucket: config.storage_bucket.clone(),
        }
    }

    fn db(e: anyhow::Error) -> ClinicalError {
        ClinicalError::DatabaseError(e.to_string())
    }

    pub async fn list_for_patient(
        &self,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<Vec<Radiograph>, ClinicalError> {
        let path = format!(
            "{}?{}&order=uploaded_at.desc",
            RADIOGRAPHS,
            patient.client_or_email_filter()
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)
    }

    async fn get_owned(
        &self,
        radiograph_id: i64,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<Radiograph, ClinicalError> {
        let path = format!("{}?id=eq.{}&limit=1", RADIOGRAPHS, radiograph_id);
        let rows: Vec<Radiograph> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;

        rows.into_iter()
            .next()
            .filter(|r| patient.owns(r.client_id, r.patient_email.as_deref()))
            .ok_or(ClinicalError::NotFound("Radiografía no encontrada"))
    }

    #[instrument(skip(self, patient, auth_token))]
    pub async fn download(
        &self,
        radiograph_id: i64,
        patient: &PatientScope,
        auth_token: &str,
    ) -> Result<RadiographDownload, ClinicalError> {
        let radiograph = self.get_owned(radiograph_id, patient, auth_token).await?;

        let storage_path = radiograph
            .storage_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                ClinicalError::Validation(
                    "Esta radiografía no tiene imagen disponible".to_string(),
                )
            })?;

        let object = self
            .supabase
            .download_object(storage_path, auth_token)
            .await
            .map_err(|e| {
                warn!(radiograph_id, error = %e, "radiograph download failed");
                ClinicalError::Storage(e.to_string())
            })?;

        Ok(RadiographDownload {
            filename: radiograph.download_filename(&object.content_type),
            object,
        })
    }

    #[instrument(
        skip(self, staff, request, auth_token),
        fields(staff_id = staff.id, client_id = request.cliente_id)
    )]
    pub async fn upload(
        &self,
        staff: &StaffPrincipal,
        request: &UploadRadiographRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<Radiograph, ClinicalError> {
        let kind: RadiographKind = request.tipo.parse()?;

        let (data_url_type, payload) = split_data_url(request.imagen.trim());
        let bytes = BASE64
            .decode(payload)
            .map_err(|e| ClinicalError::Validation(format!("Imagen inválida: {}", e)))?;
        if bytes.is_empty() {
            return Err(ClinicalError::Validation("La imagen está vacía".to_string()));
        }

        let content_type = data_url_type
            .or(request.content_type.as_deref())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let client = self
            .clients
            .get_client(request.cliente_id, auth_token)
            .await
            .map_err(client_error)?;

        let object_path = format!(
            "radiografias/{}/{}{}",
            client.id,
            Uuid::new_v4(),
            extension_for(&content_type)
        );
        debug!(object_path = %object_path, size = bytes.len(), "uploading radiograph");

        let storage_path = self
            .supabase
            .upload_object(&self.bucket, &object_path, bytes, &content_type, auth_token)
            .await
            .map_err(|e| ClinicalError::Storage(e.to_string()))?;

        let body = json!({
            "client_id": client.id,
            "appointment_id": request.cita_id,
            "dentist_id": staff.id,
            "patient_email": client.email,
            "kind": kind,
            "description": request.descripcion.as_deref().map(str::trim).filter(|d| !d.is_empty()),
            "storage_path": storage_path,
        });
        let rows: Vec<Radiograph> = self
            .supabase
            .request_with_headers(
                Method::POST,
                RADIOGRAPHS,
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let radiograph = rows
            .into_iter()
            .next()
            .ok_or_else(|| {
                ClinicalError::DatabaseError("Radiograph insert returned no rows".to_string())
            })?;

        info!(radiograph_id = radiograph.id, "radiograph stored");

        let entry = NewAuditEntry::new(
            AuditAction::Create,
            AuditModule::Radiographs,
            format!("Radiografía {} cargada para {}", kind.label(), client.full_name),
        )
        .with_actor(&Actor::Staff(staff.clone()))
        .with_object("radiografia", radiograph.id)
        .with_ip(ip_address);
        self.audit.record_best_effort(entry, auth_token).await;

        Ok(radiograph)
    }
}
