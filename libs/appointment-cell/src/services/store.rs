use chrono::Utc;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::query_timestamp;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

pub(crate) const APPOINTMENTS: &str = "/rest/v1/appointments";

/// Embeds the dentist, service type and client summaries alongside each row.
pub(crate) const APPOINTMENT_SELECT: &str = "*,\
dentist:staff_profiles!dentist_id(id,full_name,email,specialty,license_number),\
service_type:service_types!service_type_id(id,name,category,base_price,estimated_duration_minutes),\
client:clients!client_id(id,full_name,email,phone)";

pub(crate) fn status_in(statuses: &[AppointmentStatus]) -> String {
    let names: Vec<&str> = statuses.iter().map(AppointmentStatus::as_str).collect();
    format!("status=in.({})", names.join(","))
}

/// Thin PostgREST access layer for the `appointments` table.
pub(crate) struct AppointmentStore {
    supabase: SupabaseClient,
}

impl AppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn db(e: anyhow::Error) -> AppointmentError {
        AppointmentError::DatabaseError(e.to_string())
    }

    pub async fn get(
        &self,
        appointment_id: i64,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "{}?id=eq.{}&select={}&limit=1",
            APPOINTMENTS, appointment_id, APPOINTMENT_SELECT
        );
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;
        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Rows matching raw PostgREST filters, with summaries embedded.
    pub async fn list(
        &self,
        filters: &[String],
        order: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut params = filters.to_vec();
        params.push(format!("select={}", APPOINTMENT_SELECT));
        params.push(format!("order={}", order));

        let path = format!("{}?{}", APPOINTMENTS, params.join("&"));
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)
    }

    pub async fn count(
        &self,
        filters: &[String],
        auth_token: &str,
    ) -> Result<u64, AppointmentError> {
        let path = if filters.is_empty() {
            APPOINTMENTS.to_string()
        } else {
            format!("{}?{}", APPOINTMENTS, filters.join("&"))
        };
        self.supabase.count(&path, Some(auth_token)).await.map_err(Self::db)
    }

    pub async fn insert(
        &self,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &format!("{}?select={}", APPOINTMENTS, APPOINTMENT_SELECT),
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| {
                AppointmentError::DatabaseError("Appointment insert returned no rows".to_string())
            })
    }

    /// Compare-and-set update: only applies while the row still has `expected` status.
    /// `None` means another writer changed the row first.
    pub async fn update_if_status(
        &self,
        appointment_id: i64,
        expected: AppointmentStatus,
        mut changes: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        changes.insert(
            "updated_at".to_string(),
            Value::String(query_timestamp(Utc::now())),
        );

        let path = format!(
            "{}?id=eq.{}&status=eq.{}&select={}",
            APPOINTMENTS,
            appointment_id,
            expected.as_str(),
            APPOINTMENT_SELECT
        );
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(changes)),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;

        let updated = rows.into_iter().next();
        debug!(
            appointment_id,
            expected = %expected,
            applied = updated.is_some(),
            "conditional update"
        );
        Ok(updated)
    }

    /// `(appointment_id, odontogram_id)` pairs for the given appointments, in one request.
    pub async fn odontograms_for(
        &self,
        appointment_ids: &[i64],
        auth_token: &str,
    ) -> Result<Vec<(i64, i64)>, AppointmentError> {
        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        #[derive(serde::Deserialize)]
        struct Row {
            id: i64,
            appointment_id: i64,
        }

        let ids: Vec<String> = appointment_ids.iter().map(i64::to_string).collect();
        let path = format!(
            "/rest/v1/odontograms?appointment_id=in.({})&select=id,appointment_id",
            ids.join(",")
        );
        let rows: Vec<Row> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::db)?;
        Ok(rows.into_iter().map(|r| (r.appointment_id, r.id)).collect())
    }
}
