use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use notification_cell::models::{AppointmentNotice, NotificationOutcome};
use notification_cell::services::notification::NotificationService;
use patient_cell::models::ClientIdentity;
use patient_cell::services::ClientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, PatientPrincipal, StaffPrincipal};
use shared_utils::clock::query_timestamp;
use staff_cell::services::StaffService;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, CreateSlotRequest};
use crate::services::lifecycle::AppointmentLifecycle;
use crate::services::store::{status_in, AppointmentStore};
use crate::services::token::{confirmation_url, verify_confirmation_token};

#[derive(Debug, Deserialize)]
struct ActiveServiceType {
    id: i64,
    name: String,
}

/// Appends `username: <login>` to the notes once.
pub(crate) fn notes_with_username(notes: Option<&str>, username: &str) -> String {
    let marker = format!("username: {}", username);
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(existing) if existing.contains(&marker) => existing.to_string(),
        Some(existing) => format!("{}\n{}", existing, marker),
        None => marker,
    }
}

/// State-changing appointment workflow: reserve, confirm, complete, cancel, and slot creation.
pub struct BookingService {
    store: AppointmentStore,
    supabase: SupabaseClient,
    clients: ClientService,
    staff: StaffService,
    audit: AuditService,
    notifications: NotificationService,
    jwt_secret: String,
    site_url: String,
    anon_key: String,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_notifications(config, NotificationService::new(config))
    }

    pub fn with_notifications(config: &AppConfig, notifications: NotificationService) -> Self {
        Self {
            store: AppointmentStore::new(config),
            supabase: SupabaseClient::new(config),
            clients: ClientService::new(config),
            staff: StaffService::new(config),
            audit: AuditService::new(config),
            notifications,
            jwt_secret: config.supabase_jwt_secret.clone(),
            site_url: config.site_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn notice(
        &self,
        appointment: &Appointment,
        with_link: bool,
        reason: Option<String>,
    ) -> AppointmentNotice {
        AppointmentNotice {
            appointment_id: appointment.id,
            patient_name: appointment.patient_display_name().map(str::to_string),
            patient_email: appointment.contact_email().map(str::to_string),
            starts_at: appointment.starts_at,
            dentist_name: appointment.dentist.as_ref().map(|d| d.full_name.clone()),
            service_name: appointment
                .service_type
                .as_ref()
                .map(|s| s.name.clone())
                .or_else(|| appointment.consultation_type.clone()),
            price: appointment.effective_price(),
            confirmation_url: if with_link {
                confirmation_url(&self.site_url, appointment.id, &self.jwt_secret)
            } else {
                None
            },
            cancellation_reason: reason,
        }
    }

    async fn record(&self, entry: NewAuditEntry, auth_token: &str) {
        self.audit.record_best_effort(entry, auth_token).await;
    }

    /// True when the patient already holds a reserved or confirmed appointment,
    /// matched by e-mail first and then by any of their client records.
    async fn has_active_appointment(
        &self,
        email: &str,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let active = status_in(&[AppointmentStatus::Reservada, AppointmentStatus::Confirmada]);

        let by_email = self
            .store
            .count(
                &[format!("patient_email=eq.{}", urlencoding::encode(email)), active.clone()],
                auth_token,
            )
            .await?;
        if by_email > 0 {
            return Ok(true);
        }

        let client_ids = self
            .clients
            .active_ids_by_email(email, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        if client_ids.is_empty() {
            return Ok(false);
        }

        let ids: Vec<String> = client_ids.iter().map(i64::to_string).collect();
        let by_client = self
            .store
            .count(&[format!("client_id=in.({})", ids.join(",")), active], auth_token)
            .await?;
        Ok(by_client > 0)
    }

    #[instrument(skip(self, patient, auth_token), fields(account_id = patient.id))]
    pub async fn reserve(
        &self,
        appointment_id: i64,
        patient: &PatientPrincipal,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<(Appointment, NotificationOutcome), AppointmentError> {
        if self.has_active_appointment(&patient.email, auth_token).await? {
            warn!("patient already holds an active appointment");
            return Err(AppointmentError::ActiveAppointmentExists);
        }

        let slot = self.store.get(appointment_id, auth_token).await?;
        if slot.status != AppointmentStatus::Disponible {
            return Err(AppointmentError::SlotNotAvailable);
        }
        AppointmentLifecycle::validate(slot.status, AppointmentStatus::Reservada)?;

        let identity = ClientIdentity {
            full_name: patient.full_name.clone(),
            email: patient.email.clone(),
            phone: patient.phone.clone(),
        };
        let client = self
            .clients
            .find_or_create_by_email(&identity, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let phone = patient
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let mut changes = Map::new();
        changes.insert("client_id".to_string(), json!(client.id));
        changes.insert("patient_name".to_string(), json!(patient.full_name));
        changes.insert("patient_email".to_string(), json!(patient.email));
        changes.insert("patient_phone".to_string(), json!(phone));
        changes.insert("status".to_string(), json!(AppointmentStatus::Reservada));
        changes.insert(
            "notes".to_string(),
            json!(notes_with_username(slot.notes.as_deref(), patient.username())),
        );

        let reserved = self
            .store
            .update_if_status(appointment_id, AppointmentStatus::Disponible, changes, auth_token)
            .await?
            .ok_or(AppointmentError::SlotNotAvailable)?;

        info!(appointment_id, client_id = client.id, "appointment reserved");

        let entry = NewAuditEntry::new(
            AuditAction::Reserve,
            AuditModule::Appointments,
            format!("{} reservó la cita #{}", patient.full_name, reserved.id),
        )
        .with_actor(&Actor::Patient(patient.clone()))
        .with_object("cita", reserved.id)
        .with_details(format!("Fecha: {}", query_timestamp(reserved.starts_at)))
        .with_ip(ip_address);
        self.record(entry, auth_token).await;

        let outcome = self
            .notifications
            .appointment_confirmation(&self.notice(&reserved, true, None))
            .await;

        Ok((reserved, outcome))
    }

    /// Public confirmation through the signed e-mail link.
    #[instrument(skip(self, token))]
    pub async fn confirm(
        &self,
        appointment_id: i64,
        token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if !verify_confirmation_token(appointment_id, token, &self.jwt_secret) {
            warn!(appointment_id, "confirmation attempted with a bad token");
            return Err(AppointmentError::InvalidConfirmationToken);
        }

        let service_token = self.anon_key.as_str();
        let appointment = self.store.get(appointment_id, service_token).await?;
        if !appointment.status.is_active() {
            return Err(AppointmentError::NotReserved);
        }
        AppointmentLifecycle::validate(appointment.status, AppointmentStatus::Confirmada)?;

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(AppointmentStatus::Confirmada));

        let confirmed = self
            .store
            .update_if_status(appointment_id, appointment.status, changes, service_token)
            .await?
            .ok_or(AppointmentError::StaleStatus)?;

        info!(appointment_id, "appointment confirmed from e-mail link");

        let entry = NewAuditEntry::new(
            AuditAction::Confirm,
            AuditModule::Appointments,
            format!("Cita #{} confirmada desde el enlace de correo", confirmed.id),
        )
        .with_object("cita", confirmed.id);
        self.record(entry, service_token).await;

        Ok(confirmed)
    }

    #[instrument(skip(self, staff, auth_token), fields(staff_id = staff.id))]
    pub async fn complete(
        &self,
        appointment_id: i64,
        staff: &StaffPrincipal,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get(appointment_id, auth_token).await?;
        AppointmentLifecycle::validate(appointment.status, AppointmentStatus::Completada)?;

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(AppointmentStatus::Completada));

        let completed = self
            .store
            .update_if_status(appointment_id, appointment.status, changes, auth_token)
            .await?
            .ok_or(AppointmentError::StaleStatus)?;

        let entry = NewAuditEntry::new(
            AuditAction::Complete,
            AuditModule::Appointments,
            format!(
                "Cita #{} de {} marcada como completada",
                completed.id,
                completed.patient_display_name().unwrap_or("paciente sin nombre")
            ),
        )
        .with_actor(&Actor::Staff(staff.clone()))
        .with_object("cita", completed.id)
        .with_ip(ip_address);
        self.record(entry, auth_token).await;

        Ok(completed)
    }

    async fn owned_by(
        &self,
        appointment: &Appointment,
        patient: &PatientPrincipal,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        if appointment
            .patient_email
            .as_deref()
            .is_some_and(|email| email.eq_ignore_ascii_case(&patient.email))
        {
            return Ok(true);
        }
        let Some(client_id) = appointment.client_id else {
            return Ok(false);
        };
        let ids = self
            .clients
            .active_ids_by_email(&patient.email, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        Ok(ids.contains(&client_id))
    }

    /// Staff may cancel anything not yet terminal; patients only their own active bookings.
    #[instrument(skip(self, actor, reason, auth_token))]
    pub async fn cancel(
        &self,
        appointment_id: i64,
        actor: &Actor,
        reason: Option<String>,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<(Appointment, Option<NotificationOutcome>), AppointmentError> {
        let appointment = self.store.get(appointment_id, auth_token).await?;

        match actor {
            Actor::Staff(_) => {}
            Actor::Patient(patient) => {
                if !self.owned_by(&appointment, patient, auth_token).await? {
                    return Err(AppointmentError::Unauthorized);
                }
                if !appointment.status.is_active() {
                    return Err(AppointmentError::InvalidStatusTransition {
                        from: appointment.status,
                        to: AppointmentStatus::Cancelada,
                    });
                }
            }
            Actor::Anonymous => return Err(AppointmentError::Unauthorized),
        }
        AppointmentLifecycle::validate(appointment.status, AppointmentStatus::Cancelada)?;

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(AppointmentStatus::Cancelada));

        let cancelled = self
            .store
            .update_if_status(appointment_id, appointment.status, changes, auth_token)
            .await?
            .ok_or(AppointmentError::StaleStatus)?;

        info!(appointment_id, previous = %appointment.status, "appointment cancelled");

        let mut entry = NewAuditEntry::new(
            AuditAction::Cancel,
            AuditModule::Appointments,
            format!(
                "{} canceló la cita #{}",
                actor.display_name().unwrap_or_else(|| "Sistema".to_string()),
                cancelled.id
            ),
        )
        .with_actor(actor)
        .with_object("cita", cancelled.id)
        .with_ip(ip_address);
        if let Some(reason) = &reason {
            entry = entry.with_details(format!("Motivo: {}", reason));
        }
        self.record(entry, auth_token).await;

        // Withdrawn empty slots have nobody to notify.
        let outcome = if appointment.status.is_active() && cancelled.contact_email().is_some() {
            Some(
                self.notifications
                    .appointment_cancellation(&self.notice(&cancelled, false, reason))
                    .await,
            )
        } else {
            None
        };

        Ok((cancelled, outcome))
    }

    #[instrument(skip(self, staff, request, auth_token), fields(staff_id = staff.id))]
    pub async fn create_slot(
        &self,
        staff: &StaffPrincipal,
        request: &CreateSlotRequest,
        now: DateTime<Utc>,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.fecha_hora <= now {
            return Err(AppointmentError::ValidationError(
                "La fecha y hora de la cita deben ser futuras".to_string(),
            ));
        }
        if request.precio_cobrado.is_some_and(|price| price < 0) {
            return Err(AppointmentError::ValidationError(
                "El precio no puede ser negativo".to_string(),
            ));
        }

        let dentist = self
            .staff
            .find_dentist(request.dentista_id, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .filter(|d| d.active)
            .ok_or_else(|| {
                AppointmentError::ValidationError(
                    "El dentista seleccionado no existe o está inactivo".to_string(),
                )
            })?;

        let service_path = format!(
            "/rest/v1/service_types?id=eq.{}&active=is.true&select=id,name&limit=1",
            request.tipo_servicio_id
        );
        let service: ActiveServiceType = self
            .supabase
            .request::<Vec<ActiveServiceType>>(Method::GET, &service_path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppointmentError::ValidationError(
                    "El tipo de servicio no existe o está inactivo".to_string(),
                )
            })?;

        let starts_at = query_timestamp(request.fecha_hora);
        let clashes = self
            .store
            .count(
                &[
                    format!("dentist_id=eq.{}", dentist.id),
                    format!("starts_at=eq.{}", starts_at),
                    "status=neq.cancelada".to_string(),
                ],
                auth_token,
            )
            .await?;
        if clashes > 0 {
            return Err(AppointmentError::DuplicateSlot);
        }

        let consultation_type = request
            .tipo_consulta
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| service.name.clone());

        let body: Value = json!({
            "starts_at": starts_at,
            "status": AppointmentStatus::Disponible,
            "dentist_id": dentist.id,
            "service_type_id": service.id,
            "consultation_type": consultation_type,
            "charged_price": request.precio_cobrado,
            "notes": request.notas.as_deref().map(str::trim).filter(|n| !n.is_empty()),
        });
        let slot = self.store.insert(body, auth_token).await?;

        info!(appointment_id = slot.id, dentist_id = dentist.id, "appointment slot created");

        let entry = NewAuditEntry::new(
            AuditAction::Create,
            AuditModule::Appointments,
            format!("Cita disponible creada para {} ({})", dentist.full_name, service.name),
        )
        .with_actor(&Actor::Staff(staff.clone()))
        .with_object("cita", slot.id)
        .with_details(format!("Fecha: {}", starts_at))
        .with_ip(ip_address);
        self.record(entry, auth_token).await;

        Ok(slot)
    }
}
