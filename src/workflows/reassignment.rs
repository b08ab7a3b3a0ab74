use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::availability::check_availability;
use super::{ServiceError, ServiceResult};
use crate::models::{Appointment, Employee};
use crate::schema::{appointments, employees};

pub const APPOINTMENT_ACCEPTED: &str = "ACCEPTED";
pub const APPOINTMENT_REJECTED: &str = "REJECTED";
pub const APPOINTMENT_NEEDS_REASSIGNMENT: &str = "NEEDS_REASSIGNMENT";
pub const APPOINTMENT_CANCELLED: &str = "CANCELLED";

/// Appointments in these states do not occupy their employee's time.
pub const NON_BLOCKING_APPOINTMENT_STATUSES: &[&str] = &[
    APPOINTMENT_CANCELLED,
    APPOINTMENT_REJECTED,
    APPOINTMENT_NEEDS_REASSIGNMENT,
];

pub fn list_needing_reassignment(
    conn: &mut PgConnection,
    tenant_id: Uuid,
) -> ServiceResult<Vec<Appointment>> {
    let rows = appointments::table
        .filter(appointments::tenant_id.eq(tenant_id))
        .filter(appointments::status.eq(APPOINTMENT_NEEDS_REASSIGNMENT))
        .order(appointments::start_time.asc())
        .load(conn)?;
    Ok(rows)
}

/// Moves an appointment out of `NEEDS_REASSIGNMENT` onto `new_employee_id`.
///
/// An appointment that is missing, owned by another tenant or in any other state
/// is reported as not found. Unless `admin_override` is set, the target employee
/// must be available over the appointment's interval.
pub fn reassign(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    appointment_id: Uuid,
    new_employee_id: Uuid,
    admin_override: bool,
) -> ServiceResult<Appointment> {
    conn.transaction::<Appointment, ServiceError, _>(|conn| {
        let appointment: Appointment = appointments::table
            .filter(appointments::id.eq(appointment_id))
            .filter(appointments::tenant_id.eq(tenant_id))
            .filter(appointments::status.eq(APPOINTMENT_NEEDS_REASSIGNMENT))
            .for_update()
            .first(conn)
            .optional()?
            .ok_or(ServiceError::NotFound("appointment"))?;

        let employee: Employee = employees::table
            .filter(employees::id.eq(new_employee_id))
            .filter(employees::tenant_id.eq(tenant_id))
            .filter(employees::is_active.eq(true))
            .first(conn)
            .optional()?
            .ok_or(ServiceError::NotFound("employee"))?;

        if !admin_override {
            let availability = check_availability(
                conn,
                tenant_id,
                employee.id,
                appointment.start_time,
                appointment.end_time,
                Some(appointment.id),
            )?;
            if let Some(reason) = availability.reason {
                return Err(ServiceError::validation_with(
                    format!("employee is not available: {}", reason.as_str()),
                    json!({ "reason": reason.as_str() }),
                ));
            }
        }

        let updated: Appointment = diesel::update(appointments::table.find(appointment.id))
            .set((
                appointments::employee_id.eq(Some(employee.id)),
                appointments::status.eq(APPOINTMENT_ACCEPTED),
                appointments::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(conn)?;

        info!(
            %tenant_id,
            appointment_id = %updated.id,
            previous_employee_id = ?appointment.employee_id,
            employee_id = %employee.id,
            admin_override,
            "appointment reassigned"
        );
        Ok(updated)
    })
}
