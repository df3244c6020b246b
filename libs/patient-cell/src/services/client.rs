use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::validation::ilike_pattern;

use crate::models::{Client, ClientIdentity, ClientListQuery, PatientError};

/// Phone stored on client records created from accounts that never gave one.
pub const PLACEHOLDER_PHONE: &str = "+56900000000";

const CLIENT_SELECT: &str = "*,assigned_dentist:staff_profiles!assigned_dentist_id(full_name)";

pub struct ClientService {
    supabase: SupabaseClient,
}

impl ClientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn db(e: anyhow::Error) -> PatientError {
        PatientError::DatabaseError(e.to_string())
    }

    async fn fetch(&self, path: &str, auth_token: &str) -> Result<Vec<Client>, PatientError> {
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(Self::db)
    }

    /// Active client registered under `email`, with the assigned dentist's name embedded.
    #[instrument(skip(self, auth_token))]
    pub async fn verify_client(
        &self,
        email: &str,
        auth_token: &str,
    ) -> Result<Option<Client>, PatientError> {
        let path = format!(
            "/rest/v1/clients?email=eq.{}&active=is.true&select={}&limit=1",
            urlencoding::encode(email),
            CLIENT_SELECT
        );
        Ok(self.fetch(&path, auth_token).await?.into_iter().next())
    }

    pub async fn find_by_email(
        &self,
        email: &str,
        auth_token: &str,
    ) -> Result<Option<Client>, PatientError> {
        let path = format!(
            "/rest/v1/clients?email=eq.{}&order=id.asc&limit=1",
            urlencoding::encode(email)
        );
        Ok(self.fetch(&path, auth_token).await?.into_iter().next())
    }

    /// Ids of every active client sharing this e-mail; used for ownership checks.
    pub async fn active_ids_by_email(
        &self,
        email: &str,
        auth_token: &str,
    ) -> Result<Vec<i64>, PatientError> {
        let path = format!(
            "/rest/v1/clients?email=eq.{}&active=is.true&select=*",
            urlencoding::encode(email)
        );
        Ok(self
            .fetch(&path, auth_token)
            .await?
            .into_iter()
            .map(|client| client.id)
            .collect())
    }

    /// Returns the client for `identity.email`, creating it when missing. An existing
    /// record picks up a changed name or phone and is reactivated if needed.
    #[instrument(skip(self, identity, auth_token), fields(email = %identity.email))]
    pub async fn find_or_create_by_email(
        &self,
        identity: &ClientIdentity,
        auth_token: &str,
    ) -> Result<Client, PatientError> {
        let phone = identity
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let Some(existing) = self.find_by_email(&identity.email, auth_token).await? else {
            let body = json!({
                "full_name": identity.full_name,
                "email": identity.email,
                "phone": phone.unwrap_or(PLACEHOLDER_PHONE),
                "active": true,
            });

            let rows: Vec<Client> = self
                .supabase
                .request_with_headers(
                    Method::POST,
                    "/rest/v1/clients",
                    Some(auth_token),
                    Some(body),
                    Some(SupabaseClient::representation_headers()),
                )
                .await
                .map_err(Self::db)?;

            let created = rows
                .into_iter()
                .next()
                .ok_or_else(|| {
                    PatientError::DatabaseError("Client insert returned no rows".to_string())
                })?;
            info!(client_id = created.id, "client record created from booking");
            return Ok(created);
        };

        let mut changes = Map::new();
        if !identity.full_name.trim().is_empty() && existing.full_name != identity.full_name {
            changes.insert("full_name".to_string(), json!(identity.full_name));
        }
        if let Some(phone) = phone {
            if existing.phone != phone {
                changes.insert("phone".to_string(), json!(phone));
            }
        }
        if !existing.active {
            changes.insert("active".to_string(), json!(true));
        }

        if changes.is_empty() {
            return Ok(existing);
        }

        debug!(client_id = existing.id, fields = changes.len(), "refreshing client record");
        let rows: Vec<Client> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/clients?id=eq.{}", existing.id),
                Some(auth_token),
                Some(Value::Object(changes)),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;

        Ok(rows.into_iter().next().unwrap_or(existing))
    }

    #[instrument(skip(self, auth_token))]
    pub async fn list_clients(
        &self,
        query: &ClientListQuery,
        auth_token: &str,
    ) -> Result<Vec<Client>, PatientError> {
        let mut params = vec![format!("select={}", CLIENT_SELECT)];

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = ilike_pattern(term);
            params.push(format!(
                "or=(full_name.ilike.{p},email.ilike.{p},phone.ilike.{p},rut.ilike.{p})",
                p = pattern
            ));
        }
        match query.estado.as_deref() {
            Some("activo") => params.push("active=is.true".to_string()),
            Some("inactivo") => params.push("active=is.false".to_string()),
            _ => {}
        }
        params.push("order=full_name.asc".to_string());

        let path = format!("/rest/v1/clients?{}", params.join("&"));
        self.fetch(&path, auth_token).await
    }

    pub async fn get_client(
        &self,
        client_id: i64,
        auth_token: &str,
    ) -> Result<Client, PatientError> {
        let path = format!("/rest/v1/clients?id=eq.{}&select={}&limit=1", client_id, CLIENT_SELECT);
        self.fetch(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(PatientError::ClientNotFound)
    }
}
