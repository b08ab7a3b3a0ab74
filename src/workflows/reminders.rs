use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use diesel::dsl::{count_star, max};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::models::{Invoice, InvoiceReminder, NewInvoiceReminder};
use crate::schema::{invoice_reminders, invoices};

pub const INVOICE_PENDING: &str = "PENDING";
pub const INVOICE_OVERDUE: &str = "OVERDUE";

/// Invoice states that can still become overdue.
pub const OPEN_INVOICE_STATUSES: &[&str] = &[INVOICE_PENDING, INVOICE_OVERDUE];

pub const REMINDER_PENDING: &str = "PENDING";
pub const REMINDER_SENT: &str = "SENT";
pub const REMINDER_FAILED: &str = "FAILED";

pub const MIN_REMINDER_LEVEL: i32 = 1;
pub const MAX_REMINDER_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReminderMethod {
    Email,
    Letter,
    Phone,
}

impl ReminderMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderMethod::Email => "EMAIL",
            ReminderMethod::Letter => "LETTER",
            ReminderMethod::Phone => "PHONE",
        }
    }
}

/// Escalation tier of a dunning notice, always within 1..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReminderLevel(i32);

impl ReminderLevel {
    pub fn new(level: i32) -> ServiceResult<Self> {
        if (MIN_REMINDER_LEVEL..=MAX_REMINDER_LEVEL).contains(&level) {
            Ok(Self(level))
        } else {
            Err(ServiceError::validation_with(
                format!("level must be between {MIN_REMINDER_LEVEL} and {MAX_REMINDER_LEVEL}"),
                json!({ "level": level }),
            ))
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

/// Whole days `now` lies past `due_date`; zero while not yet due.
pub fn days_overdue(due_date: NaiveDate, now: NaiveDateTime) -> i64 {
    (now.date() - due_date).num_days().max(0)
}

#[derive(Debug, Clone)]
pub struct ReminderDraft {
    pub invoice_id: Uuid,
    pub level: i32,
    pub method: ReminderMethod,
    pub message: Option<String>,
}

pub fn create_reminder(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    draft: ReminderDraft,
    now: NaiveDateTime,
) -> ServiceResult<InvoiceReminder> {
    let level = ReminderLevel::new(draft.level)?;

    conn.transaction::<InvoiceReminder, ServiceError, _>(|conn| {
        let invoice: Invoice = invoices::table
            .filter(invoices::id.eq(draft.invoice_id))
            .filter(invoices::tenant_id.eq(tenant_id))
            .for_update()
            .first(conn)
            .optional()?
            .ok_or(ServiceError::NotFound("invoice"))?;

        if !OPEN_INVOICE_STATUSES.contains(&invoice.status.as_str()) {
            return Err(ServiceError::validation(format!(
                "cannot remind about a {} invoice",
                invoice.status.to_lowercase()
            )));
        }

        let highest: Option<i32> = invoice_reminders::table
            .filter(invoice_reminders::invoice_id.eq(invoice.id))
            .filter(invoice_reminders::status.ne(REMINDER_FAILED))
            .select(max(invoice_reminders::level))
            .first(conn)?;
        if let Some(highest) = highest.filter(|highest| *highest >= level.get()) {
            return Err(ServiceError::validation_with(
                format!("a level {highest} reminder already exists"),
                json!({ "highestLevel": highest }),
            ));
        }

        let new_reminder = NewInvoiceReminder {
            id: Uuid::new_v4(),
            tenant_id,
            invoice_id: invoice.id,
            level: level.get(),
            method: draft.method.as_str().to_string(),
            status: REMINDER_PENDING.to_string(),
            reminder_date: now,
            message: draft
                .message
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        };

        let reminder: InvoiceReminder = diesel::insert_into(invoice_reminders::table)
            .values(&new_reminder)
            .get_result(conn)?;

        info!(
            %tenant_id,
            invoice_id = %invoice.id,
            reminder_id = %reminder.id,
            level = reminder.level,
            days_overdue = days_overdue(invoice.due_date, now),
            "invoice reminder created"
        );
        Ok(reminder)
    })
}

/// Terminal transition; re-applying simply overwrites status and timestamp.
pub fn mark_reminder_sent(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    reminder_id: Uuid,
    now: NaiveDateTime,
) -> ServiceResult<InvoiceReminder> {
    diesel::update(
        invoice_reminders::table
            .filter(invoice_reminders::id.eq(reminder_id))
            .filter(invoice_reminders::tenant_id.eq(tenant_id)),
    )
    .set((
        invoice_reminders::status.eq(REMINDER_SENT),
        invoice_reminders::sent_at.eq(Some(now)),
        invoice_reminders::error_message.eq::<Option<String>>(None),
        invoice_reminders::updated_at.eq(now),
    ))
    .get_result(conn)
    .optional()?
    .ok_or(ServiceError::NotFound("reminder"))
}

pub fn mark_reminder_failed(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    reminder_id: Uuid,
    error_message: Option<String>,
    now: NaiveDateTime,
) -> ServiceResult<InvoiceReminder> {
    diesel::update(
        invoice_reminders::table
            .filter(invoice_reminders::id.eq(reminder_id))
            .filter(invoice_reminders::tenant_id.eq(tenant_id)),
    )
    .set((
        invoice_reminders::status.eq(REMINDER_FAILED),
        invoice_reminders::error_message.eq(error_message),
        invoice_reminders::updated_at.eq(now),
    ))
    .get_result(conn)
    .optional()?
    .ok_or(ServiceError::NotFound("reminder"))
}

#[derive(Debug, Clone)]
pub struct OverdueInvoice {
    pub invoice: Invoice,
    pub days_overdue: i64,
    pub highest_reminder_level: Option<i32>,
}

/// Open invoices whose due date lies before `now`'s date, oldest first.
pub fn overdue_invoices(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    now: NaiveDateTime,
) -> ServiceResult<Vec<OverdueInvoice>> {
    let rows: Vec<Invoice> = invoices::table
        .filter(invoices::tenant_id.eq(tenant_id))
        .filter(invoices::status.eq_any(OPEN_INVOICE_STATUSES))
        .filter(invoices::due_date.lt(now.date()))
        .order((invoices::due_date.asc(), invoices::invoice_number.asc()))
        .load(conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|invoice| invoice.id).collect();
    let levels: HashMap<Uuid, Option<i32>> = invoice_reminders::table
        .filter(invoice_reminders::invoice_id.eq_any(&ids))
        .filter(invoice_reminders::status.ne(REMINDER_FAILED))
        .group_by(invoice_reminders::invoice_id)
        .select((invoice_reminders::invoice_id, max(invoice_reminders::level)))
        .load::<(Uuid, Option<i32>)>(conn)?
        .into_iter()
        .collect();

    Ok(rows
        .into_iter()
        .map(|invoice| OverdueInvoice {
            days_overdue: days_overdue(invoice.due_date, now),
            highest_reminder_level: levels.get(&invoice.id).copied().flatten(),
            invoice,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderStats {
    pub overdue_invoices: usize,
    pub overdue_amount_cents: i64,
    pub average_days_overdue: f64,
    pub reminders_by_level: BTreeMap<i32, i64>,
    pub reminders_by_status: BTreeMap<String, i64>,
}

pub fn reminder_stats(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    now: NaiveDateTime,
) -> ServiceResult<ReminderStats> {
    let overdue = overdue_invoices(conn, tenant_id, now)?;
    let overdue_amount_cents: i64 = overdue.iter().map(|entry| entry.invoice.amount_cents).sum();
    let average_days_overdue = if overdue.is_empty() {
        0.0
    } else {
        overdue.iter().map(|entry| entry.days_overdue).sum::<i64>() as f64 / overdue.len() as f64
    };

    let reminders_by_level: BTreeMap<i32, i64> = invoice_reminders::table
        .filter(invoice_reminders::tenant_id.eq(tenant_id))
        .group_by(invoice_reminders::level)
        .select((invoice_reminders::level, count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();

    let reminders_by_status: BTreeMap<String, i64> = invoice_reminders::table
        .filter(invoice_reminders::tenant_id.eq(tenant_id))
        .group_by(invoice_reminders::status)
        .select((invoice_reminders::status, count_star()))
        .load::<(String, i64)>(conn)?
        .into_iter()
        .collect();

    Ok(ReminderStats {
        overdue_invoices: overdue.len(),
        overdue_amount_cents,
        average_days_overdue,
        reminders_by_level,
        reminders_by_status,
    })
}
