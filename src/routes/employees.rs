use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::to_iso;
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::VacationRequest;
use crate::state::AppState;
use crate::utils::json::JsonBody;
use crate::workflows::availability::{self, Availability};
use crate::workflows::vacation::{self, VacationDecision, VacationScope, VacationSubmission};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckAvailabilityRequest {
    pub employee_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmitVacationRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecideVacationRequest {
    pub status: VacationDecision,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VacationRequestResponse {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i32,
    pub reason: Option<String>,
    pub status: String,
    pub decided_at: Option<String>,
    pub created_at: String,
}

impl From<VacationRequest> for VacationRequestResponse {
    fn from(request: VacationRequest) -> Self {
        Self {
            id: request.id,
            employee_id: request.employee_id,
            start_date: request.start_date,
            end_date: request.end_date,
            days: request.days,
            reason: request.reason,
            status: request.status,
            decided_at: request.decided_at.map(to_iso),
            created_at: to_iso(request.created_at),
        }
    }
}

pub async fn check_availability(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(payload): JsonBody<CheckAvailabilityRequest>,
) -> AppResult<Json<Availability>> {
    let mut conn = state.db()?;

    let result = availability::check_availability(
        &mut conn,
        user.tenant_id,
        payload.employee_id,
        payload.start_time.naive_utc(),
        payload.end_time.naive_utc(),
        None,
    )?;
    Ok(Json(result))
}

pub async fn submit_vacation_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(payload): JsonBody<SubmitVacationRequest>,
) -> AppResult<(StatusCode, Json<VacationRequestResponse>)> {
    let mut conn = state.db()?;

    let employee = vacation::employee_for_user(&mut conn, user.tenant_id, user.user_id)?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "employee not found"))?;

    let created = vacation::submit_vacation_request(
        &mut conn,
        user.tenant_id,
        employee.id,
        VacationSubmission {
            start_date: payload.start_date,
            end_date: payload.end_date,
            reason: payload.leave_reason,
        },
        state.config.default_vacation_days,
    )?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn list_vacation_requests(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<VacationRequestResponse>>> {
    let mut conn = state.db()?;

    let scope = if user.is_admin() {
        VacationScope::Tenant
    } else {
        match vacation::employee_for_user(&mut conn, user.tenant_id, user.user_id)? {
            Some(employee) => VacationScope::Employee(employee.id),
            None => return Ok(Json(Vec::new())),
        }
    };

    let requests = vacation::list_vacation_requests(&mut conn, user.tenant_id, scope)?;
    Ok(Json(
        requests
            .into_iter()
            .map(VacationRequestResponse::from)
            .collect(),
    ))
}

pub async fn decide_vacation_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(request_id): Path<Uuid>,
    JsonBody(payload): JsonBody<DecideVacationRequest>,
) -> AppResult<Json<VacationRequestResponse>> {
    user.require_admin()?;
    let mut conn = state.db()?;

    let decided = vacation::decide_vacation_request(
        &mut conn,
        user.tenant_id,
        request_id,
        payload.status,
        user.user_id,
        state.config.default_vacation_days,
    )?;
    Ok(Json(decided.into()))
}
