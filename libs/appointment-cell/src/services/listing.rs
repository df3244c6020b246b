use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, instrument};

use patient_cell::models::{Client, ClientListQuery};
use patient_cell::services::ClientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{PatientPrincipal, StaffPrincipal};
use shared_utils::clock::{local_date, local_day_bounds, parse_filter_date, query_timestamp};
use shared_utils::formatting::{format_local_datetime, format_local_time, format_price};
use shared_utils::pagination::{paginate, Page};
use staff_cell::models::StaffProfile;
use staff_cell::services::StaffService;

use crate::models::{
    Appointment, AppointmentError, AppointmentStats, AppointmentStatus, AvailableAppointment,
    AvailableFilters, DateSlot, DentistInfo, ServiceInfo, ServiceType, StaffAppointmentRow,
    StaffListFilters, DEFAULT_LICENSE, DEFAULT_SPECIALTY,
};
use crate::services::store::{status_in, AppointmentStore};

pub const STAFF_PAGE_SIZE: u64 = 6;

/// Select lists and catalogues a staff member needs to schedule appointments.
#[derive(Debug, Serialize)]
pub struct StaffContext {
    pub dentistas: Vec<StaffProfile>,
    pub tipos_servicio: Vec<ServiceType>,
    pub clientes: Vec<Client>,
    pub es_admin: bool,
}

fn to_available(appointment: Appointment, tz: Tz) -> AvailableAppointment {
    let servicio_info = appointment.service_type.as_ref().map(|service| {
        let precio = appointment.effective_price();
        ServiceInfo {
            nombre: service.name.clone(),
            precio,
            precio_formateado: precio.map(format_price),
            duracion_estimada: service.estimated_duration_minutes,
        }
    });
    let dentista_info = appointment.dentist.as_ref().map(|dentist| DentistInfo {
        nombre: dentist.full_name.clone(),
        especialidad: dentist
            .specialty
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SPECIALTY.to_string()),
        numero_colegio: dentist
            .license_number
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LICENSE.to_string()),
    });

    AvailableAppointment {
        id: appointment.id,
        fecha_hora: appointment.starts_at,
        fecha_hora_local: format_local_datetime(appointment.starts_at, tz),
        tipo_consulta: appointment.consultation_type,
        servicio_info,
        dentista_info,
    }
}

fn parse_statuses(raw: Option<&str>) -> Vec<AppointmentStatus> {
    raw.map(|value| {
        value
            .split(',')
            .filter_map(|part| part.parse::<AppointmentStatus>().ok())
            .collect()
    })
    .unwrap_or_default()
}

fn day_filters(bounds: (DateTime<Utc>, DateTime<Utc>)) -> [String; 2] {
    [
        format!("starts_at=gte.{}", query_timestamp(bounds.0)),
        format!("starts_at=lt.{}", query_timestamp(bounds.1)),
    ]
}

/// Read-only appointment queries for the patient panel and the staff desk.
pub struct ListingService {
    store: AppointmentStore,
    supabase: SupabaseClient,
    clients: ClientService,
    staff: StaffService,
    timezone: Tz,
}

impl ListingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: AppointmentStore::new(config),
            supabase: SupabaseClient::new(config),
            clients: ClientService::new(config),
            staff: StaffService::new(config),
            timezone: config.clinic_timezone,
        }
    }

    fn db(e: impl ToString) -> AppointmentError {
        AppointmentError::DatabaseError(e.to_string())
    }

    /// Future available slots, optionally narrowed by service, day and dentist.
    /// Filter values that do not parse are ignored.
    #[instrument(skip(self, auth_token))]
    pub async fn list_available(
        &self,
        filters: &AvailableFilters,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<AvailableAppointment>, AppointmentError> {
        let mut query = vec![
            format!("status=eq.{}", AppointmentStatus::Disponible),
            format!("starts_at=gte.{}", query_timestamp(now)),
        ];

        if let Some(kind) = filters
            .tipo_consulta
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            match kind.parse::<i64>() {
                Ok(service_type_id) => {
                    query.push(format!("service_type_id=eq.{}", service_type_id))
                }
                Err(_) => {
                    query.push(format!("consultation_type=eq.{}", urlencoding::encode(kind)))
                }
            }
        }

        if let Some(date) = parse_filter_date(filters.fecha.as_deref()) {
            query.extend(day_filters(local_day_bounds(date, self.timezone)));
        }

        if let Some(dentist_id) = filters
            .dentista_id
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
        {
            query.push(format!("dentist_id=eq.{}", dentist_id));
        }

        let rows = self.store.list(&query, "starts_at.asc", auth_token).await?;
        debug!(count = rows.len(), "available appointments fetched");

        Ok(rows
            .into_iter()
            .map(|row| to_available(row, self.timezone))
            .collect())
    }

    /// Available slots on one clinic-local day.
    pub async fn slots_for_date(
        &self,
        raw_date: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<DateSlot>, AppointmentError> {
        let date = parse_filter_date(raw_date)
            .ok_or_else(|| {
                AppointmentError::ValidationError("Formato de fecha inválido".to_string())
            })?;

        let mut query = vec![format!("status=eq.{}", AppointmentStatus::Disponible)];
        query.extend(day_filters(local_day_bounds(date, self.timezone)));

        let rows = self.store.list(&query, "starts_at.asc", auth_token).await?;
        Ok(rows
            .into_iter()
            .map(|row| DateSlot {
                id: row.id,
                fecha_hora: format_local_datetime(row.starts_at, self.timezone),
                hora: format_local_time(row.starts_at, self.timezone),
            })
            .collect())
    }

    async fn active_client_ids(
        &self,
        email: &str,
        auth_token: &str,
    ) -> Result<Vec<i64>, AppointmentError> {
        self.clients
            .active_ids_by_email(email, auth_token)
            .await
            .map_err(Self::db)
    }

    async fn by_client_or_email(
        &self,
        email: &str,
        client_ids: &[i64],
        statuses: &[AppointmentStatus],
        order: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let status_filter = status_in(statuses);
        let mut rows = self
            .store
            .list(
                &[
                    format!("patient_email=eq.{}", urlencoding::encode(email)),
                    status_filter.clone(),
                ],
                order,
                auth_token,
            )
            .await?;

        if !client_ids.is_empty() {
            let ids: Vec<String> = client_ids.iter().map(i64::to_string).collect();
            let by_client = self
                .store
                .list(
                    &[format!("client_id=in.({})", ids.join(",")), status_filter],
                    order,
                    auth_token,
                )
                .await?;

            let seen: HashSet<i64> = rows.iter().map(|a| a.id).collect();
            rows.extend(by_client.into_iter().filter(|a| !seen.contains(&a.id)));
        }
        Ok(rows)
    }

    /// The patient's own reserved and confirmed appointments, soonest first.
    #[instrument(skip(self, patient, auth_token), fields(account_id = patient.id))]
    pub async fn patient_appointments(
        &self,
        patient: &PatientPrincipal,
        include_completed: bool,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut statuses = vec![AppointmentStatus::Reservada, AppointmentStatus::Confirmada];
        if include_completed {
            statuses.push(AppointmentStatus::Completada);
        }

        let client_ids = self.active_client_ids(&patient.email, auth_token).await?;
        let mut rows = self
            .by_client_or_email(&patient.email, &client_ids, &statuses, "starts_at.asc", auth_token)
            .await?;
        rows.sort_by_key(|a| a.starts_at);
        Ok(rows)
    }

    /// Every booked appointment ever tied to an e-mail, newest first. Requires an
    /// active client record for that e-mail.
    pub async fn history(
        &self,
        email: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let client_ids = self.active_client_ids(email, auth_token).await?;
        if client_ids.is_empty() {
            return Err(AppointmentError::ClientNotFound);
        }

        let statuses = [
            AppointmentStatus::Reservada,
            AppointmentStatus::Confirmada,
            AppointmentStatus::Completada,
            AppointmentStatus::Cancelada,
        ];
        let mut rows = self
            .by_client_or_email(email, &client_ids, &statuses, "starts_at.desc", auth_token)
            .await?;
        rows.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        Ok(rows)
    }

    /// Staff desk listing, filtered then paginated six to a page.
    #[instrument(skip(self, auth_token))]
    pub async fn staff_list(
        &self,
        filters: &StaffListFilters,
        auth_token: &str,
    ) -> Result<Page<StaffAppointmentRow>, AppointmentError> {
        let mut query = Vec::new();

        let statuses = parse_statuses(filters.estado.as_deref());
        if !statuses.is_empty() {
            query.push(status_in(&statuses));
        } else if filters.excluir_canceladas {
            query.push(format!("status=neq.{}", AppointmentStatus::Cancelada));
        }

        if let Some(date) = parse_filter_date(filters.fecha.as_deref()) {
            query.extend(day_filters(local_day_bounds(date, self.timezone)));
        }

        let mut rows = self.store.list(&query, "starts_at.asc", auth_token).await?;

        if let Some(term) = filters
            .buscar
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let needle = term.to_lowercase();
            rows.retain(|row| row.search_haystack().contains(&needle));
        }

        let page = paginate(rows, filters.page.as_deref(), STAFF_PAGE_SIZE);

        let ids: Vec<i64> = page.items.iter().map(|a| a.id).collect();
        let records: HashMap<i64, i64> = self
            .store
            .odontograms_for(&ids, auth_token)
            .await?
            .into_iter()
            .collect();

        let items = page
            .items
            .into_iter()
            .map(|appointment| {
                let odontogram_id = records.get(&appointment.id).copied();
                StaffAppointmentRow {
                    appointment,
                    has_record: odontogram_id.is_some(),
                    odontogram_id,
                }
            })
            .collect();

        Ok(Page::new(items, page.page, page.per_page, page.total))
    }

    /// Headline counters for the staff dashboard.
    pub async fn stats(
        &self,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<AppointmentStats, AppointmentError> {
        let today = local_day_bounds(local_date(now, self.timezone), self.timezone);

        let mut today_filters = day_filters(today).to_vec();
        today_filters.push(format!("status=neq.{}", AppointmentStatus::Cancelada));

        let citas_hoy = self.store.count(&today_filters, auth_token).await?;
        let disponibles = self
            .store
            .count(&[format!("status=eq.{}", AppointmentStatus::Disponible)], auth_token)
            .await?;
        let realizadas = self
            .store
            .count(&[format!("status=eq.{}", AppointmentStatus::Completada)], auth_token)
            .await?;

        Ok(AppointmentStats {
            citas_hoy,
            disponibles,
            realizadas,
        })
    }

    pub async fn staff_context(
        &self,
        staff: &StaffPrincipal,
        auth_token: &str,
    ) -> Result<StaffContext, AppointmentError> {
        let dentistas = self
            .staff
            .list_active_dentists(auth_token)
            .await
            .map_err(Self::db)?;

        let tipos_servicio: Vec<ServiceType> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/service_types?active=is.true&order=category.asc,name.asc",
                Some(auth_token),
                None,
            )
            .await
            .map_err(Self::db)?;

        let active_only = ClientListQuery {
            search: None,
            estado: Some("activo".to_string()),
        };
        let clientes = self
            .clients
            .list_clients(&active_only, auth_token)
            .await
            .map_err(Self::db)?;

        Ok(StaffContext {
            dentistas,
            tipos_servicio,
            clientes,
            es_admin: staff.is_admin(),
        })
    }
}
