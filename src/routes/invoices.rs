use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::to_iso;
use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::InvoiceReminder;
use crate::state::AppState;
use crate::utils::json::{JsonBody, JsonBodyOrDefault};
use crate::workflows::reminders::{self, OverdueInvoice, ReminderDraft, ReminderMethod, ReminderStats};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateReminderRequest {
    pub invoice_id: Uuid,
    pub level: i32,
    pub method: ReminderMethod,
    pub message: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MarkFailedRequest {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderResponse {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub level: i32,
    pub method: String,
    pub status: String,
    pub reminder_date: String,
    pub message: Option<String>,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
}

impl From<InvoiceReminder> for ReminderResponse {
    fn from(reminder: InvoiceReminder) -> Self {
        Self {
            id: reminder.id,
            invoice_id: reminder.invoice_id,
            level: reminder.level,
            method: reminder.method,
            status: reminder.status,
            reminder_date: to_iso(reminder.reminder_date),
            message: reminder.message,
            sent_at: reminder.sent_at.map(to_iso),
            error_message: reminder.error_message,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueInvoiceResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub status: String,
    pub days_overdue: i64,
    pub highest_reminder_level: Option<i32>,
}

impl From<OverdueInvoice> for OverdueInvoiceResponse {
    fn from(entry: OverdueInvoice) -> Self {
        Self {
            id: entry.invoice.id,
            customer_id: entry.invoice.customer_id,
            invoice_number: entry.invoice.invoice_number,
            amount_cents: entry.invoice.amount_cents,
            due_date: entry.invoice.due_date,
            status: entry.invoice.status,
            days_overdue: entry.days_overdue,
            highest_reminder_level: entry.highest_reminder_level,
        }
    }
}

pub async fn list_overdue_invoices(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<OverdueInvoiceResponse>>> {
    let mut conn = state.db()?;

    let overdue = reminders::overdue_invoices(&mut conn, user.tenant_id, Utc::now().naive_utc())?;
    Ok(Json(
        overdue
            .into_iter()
            .map(OverdueInvoiceResponse::from)
            .collect(),
    ))
}

pub async fn create_reminder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(payload): JsonBody<CreateReminderRequest>,
) -> AppResult<(StatusCode, Json<ReminderResponse>)> {
    let mut conn = state.db()?;

    let reminder = reminders::create_reminder(
        &mut conn,
        user.tenant_id,
        ReminderDraft {
            invoice_id: payload.invoice_id,
            level: payload.level,
            method: payload.method,
            message: payload.message,
        },
        Utc::now().naive_utc(),
    )?;
    Ok((StatusCode::CREATED, Json(reminder.into())))
}

pub async fn reminder_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ReminderStats>> {
    let mut conn = state.db()?;

    let stats = reminders::reminder_stats(&mut conn, user.tenant_id, Utc::now().naive_utc())?;
    Ok(Json(stats))
}

pub async fn mark_reminder_sent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(reminder_id): Path<Uuid>,
) -> AppResult<Json<ReminderResponse>> {
    let mut conn = state.db()?;

    let reminder = reminders::mark_reminder_sent(
        &mut conn,
        user.tenant_id,
        reminder_id,
        Utc::now().naive_utc(),
    )?;
    Ok(Json(reminder.into()))
}

pub async fn mark_reminder_failed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(reminder_id): Path<Uuid>,
    JsonBodyOrDefault(payload): JsonBodyOrDefault<MarkFailedRequest>,
) -> AppResult<Json<ReminderResponse>> {
    let mut conn = state.db()?;

    let reminder = reminders::mark_reminder_failed(
        &mut conn,
        user.tenant_id,
        reminder_id,
        payload.error,
        Utc::now().naive_utc(),
    )?;
    Ok(Json(reminder.into()))
}
