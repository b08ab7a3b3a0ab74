use chrono::{Datelike, Months, NaiveDate};
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::{info, warn};
use uuid::Uuid;

use super::{batch_item, BatchReport, ServiceError, ServiceResult, UnitOutcome};
use crate::models::{Employee, NewExpense};
use crate::schema::{employees, expenses};

pub const SALARY_CATEGORY: &str = "GEHALT";
pub const DEFAULT_PAYOUT_DAY: u32 = 1;

/// First and last day of the calendar month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(day);
    (first, last)
}

/// The configured payout day in `today`'s month (clamped to the month length),
/// or `today` itself once that day has already passed.
pub fn payout_date(today: NaiveDate, payout_day: Option<i32>) -> NaiveDate {
    let (first, last) = month_bounds(today);
    let day = payout_day
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(DEFAULT_PAYOUT_DAY)
        .clamp(1, last.day());
    let scheduled = first.with_day(day).unwrap_or(last);
    scheduled.max(today)
}

/// Books one `GEHALT` expense per active salaried employee for `today`'s month.
pub fn run_salary_expenses(
    conn: &mut PgConnection,
    today: NaiveDate,
) -> ServiceResult<BatchReport> {
    let salaried: Vec<Employee> = employees::table
        .filter(employees::is_active.eq(true))
        .filter(employees::fixed_salary_cents.is_not_null())
        .order(employees::id.asc())
        .load(conn)?;

    let mut report = BatchReport::new(today);
    for employee in salaried {
        let outcome = book_salary(conn, employee.id, today);
        if let Err(err) = &outcome {
            warn!(
                employee_id = %employee.id,
                tenant_id = %employee.tenant_id,
                error = %err,
                "salary expense generation failed"
            );
        }
        report.record(batch_item(employee.id, employee.tenant_id, outcome));
    }

    info!(
        %today,
        processed = report.processed,
        created = report.created,
        skipped = report.skipped,
        errors = report.errors,
        "salary run finished"
    );
    Ok(report)
}

fn book_salary(
    conn: &mut PgConnection,
    employee_id: Uuid,
    today: NaiveDate,
) -> ServiceResult<UnitOutcome> {
    conn.transaction::<UnitOutcome, ServiceError, _>(|conn| {
        // the row lock serializes concurrent runs for the same employee
        let employee: Employee = employees::table
            .find(employee_id)
            .for_update()
            .first(conn)?;
        let Some(salary_cents) = employee.fixed_salary_cents else {
            return Ok(UnitOutcome::Skipped("no fixed salary"));
        };

        let (first, last) = month_bounds(today);
        let already_booked: bool = diesel::select(exists(
            expenses::table
                .filter(expenses::employee_id.eq(employee.id))
                .filter(expenses::category.eq(SALARY_CATEGORY))
                .filter(expenses::expense_date.between(first, last)),
        ))
        .get_result(conn)?;
        if already_booked {
            return Ok(UnitOutcome::Skipped("already booked this month"));
        }

        let expense = NewExpense {
            id: Uuid::new_v4(),
            tenant_id: employee.tenant_id,
            name: format!("Gehalt {} {}", employee.name, today.format("%m/%Y")),
            amount_cents: salary_cents,
            category: SALARY_CATEGORY.to_string(),
            description: None,
            expense_date: payout_date(today, employee.salary_payout_day),
            employee_id: Some(employee.id),
            recurring_expense_id: None,
        };
        diesel::insert_into(expenses::table)
            .values(&expense)
            .execute(conn)?;

        Ok(UnitOutcome::Created(expense.id))
    })
}
