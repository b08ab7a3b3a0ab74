use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::salary::month_bounds;
use super::{batch_item, BatchReport, ServiceError, ServiceResult, UnitOutcome};
use crate::models::{NewExpense, RecurringExpense};
use crate::schema::{expenses, recurring_expenses};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecurrenceInterval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceInterval {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    /// Next run date. Month and year steps are calendar-aware and clamp to the
    /// last day of the target month, so Jan 31 + 1 month is the end of February.
    pub fn advance(self, from: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Daily => from.checked_add_days(Days::new(1)),
            Self::Weekly => from.checked_add_days(Days::new(7)),
            Self::Monthly => from.checked_add_months(Months::new(1)),
            Self::Yearly => from.checked_add_months(Months::new(12)),
        }
    }

    /// First and last day (inclusive) of the period containing `day`: the day
    /// itself, its Monday-to-Sunday week, its calendar month or its calendar year.
    pub fn period_bounds(self, day: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Daily => (day, day),
            Self::Weekly => {
                let monday = day
                    .checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))
                    .unwrap_or(day);
                (monday, monday.checked_add_days(Days::new(6)).unwrap_or(day))
            }
            Self::Monthly => month_bounds(day),
            Self::Yearly => (
                day.with_ordinal(1).unwrap_or(day),
                NaiveDate::from_ymd_opt(day.year(), 12, 31).unwrap_or(day),
            ),
        }
    }
}

/// Materializes one expense for every active template due on or before `as_of`,
/// across all tenants. A failing template is recorded and the run continues.
pub fn run_due_recurring_expenses(
    conn: &mut PgConnection,
    as_of: NaiveDate,
) -> ServiceResult<BatchReport> {
    let due: Vec<RecurringExpense> = recurring_expenses::table
        .filter(recurring_expenses::is_active.eq(true))
        .filter(recurring_expenses::next_run.le(as_of))
        .order((recurring_expenses::next_run.asc(), recurring_expenses::id.asc()))
        .load(conn)?;

    let mut report = BatchReport::new(as_of);
    for template in due {
        let outcome = materialize(conn, template.id, as_of);
        if let Err(err) = &outcome {
            if !err.is_unique_violation() {
                warn!(
                    template_id = %template.id,
                    tenant_id = %template.tenant_id,
                    error = %err,
                    "recurring expense generation failed"
                );
            }
        }
        report.record(batch_item(template.id, template.tenant_id, outcome));
    }

    info!(
        %as_of,
        processed = report.processed,
        created = report.created,
        skipped = report.skipped,
        errors = report.errors,
        "recurring expense run finished"
    );
    Ok(report)
}

fn materialize(
    conn: &mut PgConnection,
    template_id: Uuid,
    as_of: NaiveDate,
) -> ServiceResult<UnitOutcome> {
    conn.transaction::<UnitOutcome, ServiceError, _>(|conn| {
        let template: Option<RecurringExpense> = recurring_expenses::table
            .filter(recurring_expenses::id.eq(template_id))
            .filter(recurring_expenses::is_active.eq(true))
            .filter(recurring_expenses::next_run.le(as_of))
            .for_update()
            .first(conn)
            .optional()?;
        let Some(template) = template else {
            return Ok(UnitOutcome::Skipped("no longer due"));
        };

        let interval = RecurrenceInterval::parse(&template.run_interval).ok_or_else(|| {
            ServiceError::validation(format!("unknown interval {}", template.run_interval))
        })?;
        let next_run = interval.advance(template.next_run).ok_or_else(|| {
            ServiceError::validation(format!("cannot advance next run {}", template.next_run))
        })?;

        let (period_start, period_end) = interval.period_bounds(as_of);
        let already_generated: bool = diesel::select(exists(
            expenses::table
                .filter(expenses::recurring_expense_id.eq(template.id))
                .filter(expenses::expense_date.between(period_start, period_end)),
        ))
        .get_result(conn)?;
        if already_generated {
            return Ok(UnitOutcome::Skipped("already generated"));
        }

        let expense = NewExpense {
            id: Uuid::new_v4(),
            tenant_id: template.tenant_id,
            name: template.name.clone(),
            amount_cents: template.amount_cents,
            category: template.category.clone(),
            description: template.description.clone(),
            expense_date: as_of,
            employee_id: template.employee_id,
            recurring_expense_id: Some(template.id),
        };
        diesel::insert_into(expenses::table)
            .values(&expense)
            .execute(conn)?;

        diesel::update(recurring_expenses::table.find(template.id))
            .set((
                recurring_expenses::next_run.eq(next_run),
                recurring_expenses::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        info!(
            template_id = %template.id,
            tenant_id = %template.tenant_id,
            expense_id = %expense.id,
            %next_run,
            "recurring expense generated"
        );
        Ok(UnitOutcome::Created(expense.id))
    })
}
