use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::to_iso;
use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::Appointment;
use crate::state::AppState;
use crate::utils::json::JsonBody;
use crate::workflows::reassignment;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReassignRequest {
    pub employee_id: Uuid,
    #[serde(default)]
    pub admin_override: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub employee_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub updated_at: String,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            employee_id: appointment.employee_id,
            customer_id: appointment.customer_id,
            title: appointment.title,
            start_time: to_iso(appointment.start_time),
            end_time: to_iso(appointment.end_time),
            status: appointment.status,
            updated_at: to_iso(appointment.updated_at),
        }
    }
}

pub async fn list_reassignments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<AppointmentResponse>>> {
    user.require_admin()?;
    let mut conn = state.db()?;

    let appointments = reassignment::list_needing_reassignment(&mut conn, user.tenant_id)?;
    Ok(Json(
        appointments
            .into_iter()
            .map(AppointmentResponse::from)
            .collect(),
    ))
}

pub async fn reassign_appointment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(appointment_id): Path<Uuid>,
    JsonBody(payload): JsonBody<ReassignRequest>,
) -> AppResult<Json<AppointmentResponse>> {
    user.require_admin()?;
    let mut conn = state.db()?;

    let updated = reassignment::reassign(
        &mut conn,
        user.tenant_id,
        appointment_id,
        payload.employee_id,
        payload.admin_override,
    )?;
    Ok(Json(updated.into()))
}
