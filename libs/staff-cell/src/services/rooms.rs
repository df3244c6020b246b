use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use audit_cell::models::{AuditAction, AuditModule, NewAuditEntry};
use audit_cell::services::audit::AuditService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, StaffPrincipal};
use shared_utils::validation::ilike_pattern;

use crate::models::{
    AssignRoomRequest, Room, RoomOverview, RoomQuery, RoomRequest, RoomTotals, StaffError,
    StaffProfile,
};
use crate::services::profile::StaffService;

const ROOMS: &str = "/rest/v1/rooms";

#[derive(Debug, Deserialize)]
struct RoomName {
    id: i64,
    name: String,
}

/// Room administration. Every write is audited under the `salas` module.
pub struct RoomService {
    supabase: SupabaseClient,
    staff: StaffService,
    audit: AuditService,
}

impl RoomService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            staff: StaffService::new(config),
            audit: AuditService::new(config),
        }
    }

    fn db(e: anyhow::Error) -> StaffError {
        StaffError::DatabaseError(e.to_string())
    }

    async fn fetch_rooms(&self, path: &str, auth_token: &str) -> Result<Vec<Room>, StaffError> {
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(Self::db)
    }

    async fn count(&self, path: &str, auth_token: &str) -> Result<u64, StaffError> {
        self.supabase.count(path, Some(auth_token)).await.map_err(Self::db)
    }

    pub async fn get_room(&self, room_id: i64, auth_token: &str) -> Result<Room, StaffError> {
        self.fetch_rooms(&format!("{}?id=eq.{}&limit=1", ROOMS, room_id), auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or(StaffError::RoomNotFound)
    }

    /// Case-insensitive uniqueness, compared in memory so `_` and `%` in names stay literal.
    async fn ensure_unique_name(
        &self,
        name: &str,
        except: Option<i64>,
        auth_token: &str,
    ) -> Result<(), StaffError> {
        let rooms: Vec<RoomName> = self
            .supabase
            .request(Method::GET, &format!("{}?select=id,name", ROOMS), Some(auth_token), None)
            .await
            .map_err(Self::db)?;

        let wanted = name.to_lowercase();
        let taken = rooms
            .iter()
            .any(|room| Some(room.id) != except && room.name.to_lowercase() == wanted);

        if taken {
            return Err(StaffError::DuplicateRoomName(name.to_string()));
        }
        Ok(())
    }

    async fn record(&self, staff: &StaffPrincipal, entry: NewAuditEntry, auth_token: &str) {
        let entry = entry.with_actor(&Actor::Staff(staff.clone()));
        self.audit.record_best_effort(entry, auth_token).await;
    }

    #[instrument(skip(self, auth_token))]
    pub async fn overview(
        &self,
        query: &RoomQuery,
        auth_token: &str,
    ) -> Result<RoomOverview, StaffError> {
        let mut params = Vec::new();
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = ilike_pattern(term);
            params.push(format!("or=(name.ilike.{p},description.ilike.{p})", p = pattern));
        }
        match query.estado.as_deref() {
            Some("activa") => params.push("active=is.true".to_string()),
            Some("inactiva") => params.push("active=is.false".to_string()),
            _ => {}
        }
        params.push("order=name.asc".to_string());

        let salas = self
            .fetch_rooms(&format!("{}?{}", ROOMS, params.join("&")), auth_token)
            .await?;
        let salas_activas = self
            .fetch_rooms(&format!("{}?active=is.true&order=name.asc", ROOMS), auth_token)
            .await?;
        let dentistas = self.staff.list_active_dentists(auth_token).await?;

        let total = self.count(ROOMS, auth_token).await?;
        let activas = self.count(&format!("{}?active=is.true", ROOMS), auth_token).await?;
        let inactivas = self.count(&format!("{}?active=is.false", ROOMS), auth_token).await?;
        let con_sala = dentistas.iter().filter(|d| d.room_id.is_some()).count();

        Ok(RoomOverview {
            totales: RoomTotals {
                total,
                activas,
                inactivas,
                dentistas_con_sala: con_sala,
                dentistas_sin_sala: dentistas.len() - con_sala,
            },
            salas,
            dentistas,
            salas_activas,
        })
    }

    #[instrument(skip(self, staff, request, auth_token))]
    pub async fn create_room(
        &self,
        staff: &StaffPrincipal,
        request: &RoomRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<Room, StaffError> {
        let name = request.validated_name()?;
        self.ensure_unique_name(&name, None, auth_token).await?;

        let rows: Vec<Room> = self
            .supabase
            .request_with_headers(
                Method::POST,
                ROOMS,
                Some(auth_token),
                Some(json!({
                    "name": name,
                    "description": request.description(),
                    "active": request.activa,
                })),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let room = rows
            .into_iter()
            .next()
            .ok_or_else(|| StaffError::DatabaseError("Room insert returned no rows".to_string()))?;

        info!(room_id = room.id, "room created");
        let entry = NewAuditEntry::new(
            AuditAction::Create,
            AuditModule::Rooms,
            format!("Sala \"{}\" creada", room.name),
        )
        .with_object("sala", room.id)
        .with_details(format!(
            "Nombre: {}, Descripción: {}, Activa: {}",
            room.name,
            room.description.as_deref().unwrap_or("Sin descripción"),
            if room.active { "Sí" } else { "No" }
        ))
        .with_ip(ip_address);
        self.record(staff, entry, auth_token).await;

        Ok(room)
    }

    #[instrument(skip(self, staff, request, auth_token))]
    pub async fn update_room(
        &self,
        staff: &StaffPrincipal,
        room_id: i64,
        request: &RoomRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<Room, StaffError> {
        let previous = self.get_room(room_id, auth_token).await?;
        let name = request.validated_name()?;
        self.ensure_unique_name(&name, Some(room_id), auth_token).await?;

        let rows: Vec<Room> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("{}?id=eq.{}", ROOMS, room_id),
                Some(auth_token),
                Some(json!({
                    "name": name,
                    "description": request.description(),
                    "active": request.activa,
                })),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let room = rows.into_iter().next().ok_or(StaffError::RoomNotFound)?;

        let entry = NewAuditEntry::new(
            AuditAction::Update,
            AuditModule::Rooms,
            format!("Sala \"{}\" editada", room.name),
        )
        .with_object("sala", room.id)
        .with_details(format!(
            "Nombre anterior: {}, Nombre nuevo: {}, Activa: {}",
            previous.name,
            room.name,
            if room.active { "Sí" } else { "No" }
        ))
        .with_ip(ip_address);
        self.record(staff, entry, auth_token).await;

        Ok(room)
    }

    #[instrument(skip(self, staff, auth_token))]
    pub async fn delete_room(
        &self,
        staff: &StaffPrincipal,
        room_id: i64,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<Room, StaffError> {
        let room = self.get_room(room_id, auth_token).await?;

        let assigned = self
            .count(
                &format!(
                    "/rest/v1/staff_profiles?role=eq.dentista&active=is.true&room_id=eq.{}",
                    room_id
                ),
                auth_token,
            )
            .await?;
        if assigned > 0 {
            warn!(room_id, assigned, "refusing to delete a room with dentists");
            return Err(StaffError::RoomInUse {
                name: room.name,
                dentists: assigned,
            });
        }

        self.supabase
            .delete(&format!("{}?id=eq.{}", ROOMS, room_id), Some(auth_token))
            .await
            .map_err(Self::db)?;

        let entry = NewAuditEntry::new(
            AuditAction::Delete,
            AuditModule::Rooms,
            format!("Sala \"{}\" eliminada", room.name),
        )
        .with_object("sala", room.id)
        .with_details(format!("Nombre: {}", room.name))
        .with_ip(ip_address);
        self.record(staff, entry, auth_token).await;

        Ok(room)
    }

    /// Points a dentist at an active room, or clears the assignment.
    #[instrument(skip(self, staff, request, auth_token))]
    pub async fn assign_room(
        &self,
        staff: &StaffPrincipal,
        dentist_id: i64,
        request: &AssignRoomRequest,
        ip_address: Option<String>,
        auth_token: &str,
    ) -> Result<(StaffProfile, Option<Room>), StaffError> {
        let target = request.target_room()?;
        let dentist = self
            .staff
            .find_dentist(dentist_id, auth_token)
            .await?
            .ok_or(StaffError::DentistNotFound)?;

        let room = match target {
            Some(room_id) => {
                let room = self.get_room(room_id, auth_token).await.map_err(|e| match e {
                    StaffError::RoomNotFound => StaffError::InactiveRoom,
                    other => other,
                })?;
                if !room.active {
                    return Err(StaffError::InactiveRoom);
                }
                Some(room)
            }
            None => None,
        };

        let rows: Vec<StaffProfile> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/staff_profiles?id=eq.{}", dentist_id),
                Some(auth_token),
                Some(json!({ "room_id": room.as_ref().map(|r| r.id) })),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(Self::db)?;
        let updated = rows.into_iter().next().ok_or(StaffError::DentistNotFound)?;

        match (&room, &dentist.room) {
            (Some(room), _) => {
                let entry = NewAuditEntry::new(
                    AuditAction::Update,
                    AuditModule::Rooms,
                    format!("Sala asignada al dentista {}", dentist.full_name),
                )
                .with_object("sala", room.id)
                .with_details(format!("Dentista: {}, Sala: {}", dentist.full_name, room.name))
                .with_ip(ip_address);
                self.record(staff, entry, auth_token).await;
            }
            (None, Some(previous)) => {
                let entry = NewAuditEntry::new(
                    AuditAction::Update,
                    AuditModule::Rooms,
                    format!("Sala desasignada del dentista {}", dentist.full_name),
                )
                .with_object("sala", previous.id)
                .with_details(format!(
                    "Dentista: {}, Sala anterior: {}",
                    dentist.full_name, previous.name
                ))
                .with_ip(ip_address);
                self.record(staff, entry, auth_token).await;
            }
            (None, None) => {}
        }

        Ok((updated, room))
    }
}
