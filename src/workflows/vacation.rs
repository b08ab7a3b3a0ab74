use chrono::{NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::models::{Employee, NewVacationRequest, VacationRequest};
use crate::schema::{employees, vacation_requests};

pub const VACATION_PENDING: &str = "PENDING";
pub const VACATION_APPROVED: &str = "APPROVED";
pub const VACATION_REJECTED: &str = "REJECTED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VacationDecision {
    Approved,
    Rejected,
}

/// Which requests a caller may see.
#[derive(Debug, Clone, Copy)]
pub enum VacationScope {
    Tenant,
    Employee(Uuid),
}

#[derive(Debug, Clone)]
pub struct VacationSubmission {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

pub fn inclusive_days(start_date: NaiveDate, end_date: NaiveDate) -> i64 {
    (end_date - start_date).num_days() + 1
}

pub fn remaining_days(employee: &Employee, default_total: i32) -> i32 {
    employee.vacation_days_total.unwrap_or(default_total) - employee.vacation_days_used
}

/// Inclusive date ranges intersect.
pub fn ranges_intersect(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

fn ensure_allowance(requested: i64, remaining: i32) -> ServiceResult<()> {
    if requested > i64::from(remaining) {
        return Err(ServiceError::validation_with(
            format!("requested {requested} vacation days but only {remaining} remain"),
            json!({ "requested": requested, "remaining": remaining }),
        ));
    }
    Ok(())
}

fn overlaps_approved(
    conn: &mut PgConnection,
    employee_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    ignore: Option<Uuid>,
) -> ServiceResult<bool> {
    let approved: Vec<(Uuid, NaiveDate, NaiveDate)> = vacation_requests::table
        .filter(vacation_requests::employee_id.eq(employee_id))
        .filter(vacation_requests::status.eq(VACATION_APPROVED))
        .filter(vacation_requests::start_date.le(end_date))
        .filter(vacation_requests::end_date.ge(start_date))
        .select((
            vacation_requests::id,
            vacation_requests::start_date,
            vacation_requests::end_date,
        ))
        .load(conn)?;

    Ok(approved.into_iter().any(|(id, from, to)| {
        Some(id) != ignore && ranges_intersect(start_date, end_date, from, to)
    }))
}

pub fn employee_for_user(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    user_id: Uuid,
) -> ServiceResult<Option<Employee>> {
    let employee = employees::table
        .filter(employees::tenant_id.eq(tenant_id))
        .filter(employees::user_id.eq(user_id))
        .first(conn)
        .optional()?;
    Ok(employee)
}

/// Files a `PENDING` request. Only approved requests block overlapping ranges;
/// pending ones may coexist until an admin decides.
pub fn submit_vacation_request(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    employee_id: Uuid,
    submission: VacationSubmission,
    default_total: i32,
) -> ServiceResult<VacationRequest> {
    let VacationSubmission {
        start_date,
        end_date,
        reason,
    } = submission;

    if start_date >= end_date {
        return Err(ServiceError::validation("startDate must be before endDate"));
    }
    let days = inclusive_days(start_date, end_date);

    conn.transaction::<VacationRequest, ServiceError, _>(|conn| {
        let employee: Employee = employees::table
            .filter(employees::id.eq(employee_id))
            .filter(employees::tenant_id.eq(tenant_id))
            .first(conn)
            .optional()?
            .ok_or(ServiceError::NotFound("employee"))?;

        ensure_allowance(days, remaining_days(&employee, default_total))?;

        if overlaps_approved(conn, employee.id, start_date, end_date, None)? {
            return Err(ServiceError::validation_with(
                "overlap",
                json!({ "reason": "overlaps an approved vacation" }),
            ));
        }

        let new_request = NewVacationRequest {
            id: Uuid::new_v4(),
            tenant_id,
            employee_id: employee.id,
            start_date,
            end_date,
            days: days as i32,
            reason: reason
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            status: VACATION_PENDING.to_string(),
        };

        let created: VacationRequest = diesel::insert_into(vacation_requests::table)
            .values(&new_request)
            .get_result(conn)?;

        info!(
            %tenant_id,
            employee_id = %employee.id,
            request_id = %created.id,
            days,
            "vacation request submitted"
        );
        Ok(created)
    })
}

/// Approves or rejects a pending request. Approval re-validates the allowance and
/// the approved-overlap invariant with the employee row locked, then books the days.
pub fn decide_vacation_request(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request_id: Uuid,
    decision: VacationDecision,
    decided_by: Uuid,
    default_total: i32,
) -> ServiceResult<VacationRequest> {
    conn.transaction::<VacationRequest, ServiceError, _>(|conn| {
        let request: VacationRequest = vacation_requests::table
            .filter(vacation_requests::id.eq(request_id))
            .filter(vacation_requests::tenant_id.eq(tenant_id))
            .for_update()
            .first(conn)
            .optional()?
            .ok_or(ServiceError::NotFound("vacation request"))?;

        if request.status != VACATION_PENDING {
            return Err(ServiceError::validation(format!(
                "vacation request is already {}",
                request.status
            )));
        }

        let now = Utc::now().naive_utc();
        let status = match decision {
            VacationDecision::Approved => {
                let employee: Employee = employees::table
                    .find(request.employee_id)
                    .for_update()
                    .first(conn)?;

                ensure_allowance(
                    i64::from(request.days),
                    remaining_days(&employee, default_total),
                )?;

                if overlaps_approved(
                    conn,
                    employee.id,
                    request.start_date,
                    request.end_date,
                    Some(request.id),
                )? {
                    return Err(ServiceError::validation_with(
                        "overlap",
                        json!({ "reason": "overlaps an approved vacation" }),
                    ));
                }

                diesel::update(employees::table.find(employee.id))
                    .set((
                        employees::vacation_days_used
                            .eq(employees::vacation_days_used + request.days),
                        employees::updated_at.eq(now),
                    ))
                    .execute(conn)?;
                VACATION_APPROVED
            }
            VacationDecision::Rejected => VACATION_REJECTED,
        };

        let updated: VacationRequest = diesel::update(vacation_requests::table.find(request.id))
            .set((
                vacation_requests::status.eq(status),
                vacation_requests::decided_at.eq(Some(now)),
                vacation_requests::decided_by.eq(Some(decided_by)),
                vacation_requests::updated_at.eq(now),
            ))
            .get_result(conn)?;

        info!(%tenant_id, request_id = %updated.id, status, "vacation request decided");
        Ok(updated)
    })
}

pub fn list_vacation_requests(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    scope: VacationScope,
) -> ServiceResult<Vec<VacationRequest>> {
    let mut query = vacation_requests::table
        .filter(vacation_requests::tenant_id.eq(tenant_id))
        .order((
            vacation_requests::start_date.desc(),
            vacation_requests::created_at.desc(),
        ))
        .into_boxed();
    if let VacationScope::Employee(employee_id) = scope {
        query = query.filter(vacation_requests::employee_id.eq(employee_id));
    }
    Ok(query.load(conn)?)
}
