use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::reassignment::NON_BLOCKING_APPOINTMENT_STATUSES;
use super::vacation::VACATION_APPROVED;
use super::{ServiceError, ServiceResult};
use crate::models::Employee;
use crate::schema::{appointments, employees, vacation_requests};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailableReason {
    Sick,
    Vacation,
    Conflict,
}

impl UnavailableReason {
    pub fn as_str(self) -> &'static str {
        match self {
            UnavailableReason::Sick => "sick",
            UnavailableReason::Vacation => "vacation",
            UnavailableReason::Conflict => "conflict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
}

impl Availability {
    pub const AVAILABLE: Availability = Availability {
        is_available: true,
        reason: None,
    };

    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self {
            is_available: false,
            reason: Some(reason),
        }
    }
}

/// Half-open intervals `[a_start, a_end)` and `[b_start, b_end)` overlap iff
/// each starts before the other ends. Touching intervals do not overlap.
pub fn overlaps<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

/// Inclusive vacation dates as the half-open timestamp range they block.
pub fn vacation_window(start_date: NaiveDate, end_date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    (
        start_date.and_time(NaiveTime::MIN),
        end_date.and_time(NaiveTime::MIN) + Duration::days(1),
    )
}

/// Decides availability from already loaded facts. The first failing check wins:
/// sickness, then approved vacation, then overlapping appointments.
pub fn evaluate(
    is_sick: bool,
    approved_vacations: &[(NaiveDate, NaiveDate)],
    booked: &[(NaiveDateTime, NaiveDateTime)],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Availability {
    if is_sick {
        return Availability::unavailable(UnavailableReason::Sick);
    }

    let on_vacation = approved_vacations.iter().any(|(from, to)| {
        let (window_start, window_end) = vacation_window(*from, *to);
        overlaps(start, end, window_start, window_end)
    });
    if on_vacation {
        return Availability::unavailable(UnavailableReason::Vacation);
    }

    let conflicting = booked
        .iter()
        .any(|(booked_start, booked_end)| overlaps(start, end, *booked_start, *booked_end));
    if conflicting {
        return Availability::unavailable(UnavailableReason::Conflict);
    }

    Availability::AVAILABLE
}

pub fn check_availability(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    employee_id: Uuid,
    start: NaiveDateTime,
    end: NaiveDateTime,
    exclude_appointment: Option<Uuid>,
) -> ServiceResult<Availability> {
    if start >= end {
        return Err(ServiceError::validation("startTime must be before endTime"));
    }

    let employee: Employee = employees::table
        .filter(employees::id.eq(employee_id))
        .filter(employees::tenant_id.eq(tenant_id))
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound("employee"))?;

    if employee.is_sick {
        debug!(%employee_id, "employee unavailable: sick");
        return Ok(evaluate(true, &[], &[], start, end));
    }

    let vacations: Vec<(NaiveDate, NaiveDate)> = vacation_requests::table
        .filter(vacation_requests::employee_id.eq(employee_id))
        .filter(vacation_requests::tenant_id.eq(tenant_id))
        .filter(vacation_requests::status.eq(VACATION_APPROVED))
        .filter(vacation_requests::start_date.le(end.date()))
        .filter(vacation_requests::end_date.ge(start.date()))
        .select((vacation_requests::start_date, vacation_requests::end_date))
        .load(conn)?;

    let mut booked_query = appointments::table
        .filter(appointments::employee_id.eq(employee_id))
        .filter(appointments::tenant_id.eq(tenant_id))
        .filter(appointments::status.ne_all(NON_BLOCKING_APPOINTMENT_STATUSES))
        .filter(appointments::start_time.lt(end))
        .filter(appointments::end_time.gt(start))
        .select((appointments::start_time, appointments::end_time))
        .into_boxed();
    if let Some(excluded) = exclude_appointment {
        booked_query = booked_query.filter(appointments::id.ne(excluded));
    }
    let booked: Vec<(NaiveDateTime, NaiveDateTime)> = booked_query.load(conn)?;

    let availability = evaluate(false, &vacations, &booked, start, end);
    debug!(
        %employee_id,
        is_available = availability.is_available,
        reason = availability.reason.map(UnavailableReason::as_str),
        "availability checked"
    );
    Ok(availability)
}
