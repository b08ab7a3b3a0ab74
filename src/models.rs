use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tenants)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tenants)]
pub struct NewTenant {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = users)]
#[diesel(belongs_to(Tenant))]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = employees)]
#[diesel(belongs_to(Tenant))]
pub struct Employee {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub is_active: bool,
    pub is_sick: bool,
    pub vacation_days_total: Option<i32>,
    pub vacation_days_used: i32,
    pub fixed_salary_cents: Option<i64>,
    pub salary_payout_day: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, Insertable)]
#[diesel(table_name = employees)]
pub struct NewEmployee {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub is_active: bool,
    pub is_sick: bool,
    pub vacation_days_total: Option<i32>,
    pub vacation_days_used: i32,
    pub fixed_salary_cents: Option<i64>,
    pub salary_payout_day: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = customers)]
#[diesel(belongs_to(Tenant))]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = customers)]
pub struct NewCustomer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = appointments)]
#[diesel(belongs_to(Employee))]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = appointments)]
pub struct NewAppointment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = vacation_requests)]
#[diesel(belongs_to(Employee))]
pub struct VacationRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i32,
    pub reason: Option<String>,
    pub status: String,
    pub decided_at: Option<NaiveDateTime>,
    pub decided_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = vacation_requests)]
pub struct NewVacationRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i32,
    pub reason: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = recurring_expenses)]
pub struct RecurringExpense {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub amount_cents: i64,
    pub category: String,
    pub description: Option<String>,
    pub employee_id: Option<Uuid>,
    pub run_interval: String,
    pub next_run: NaiveDate,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recurring_expenses)]
pub struct NewRecurringExpense {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub amount_cents: i64,
    pub category: String,
    pub description: Option<String>,
    pub employee_id: Option<Uuid>,
    pub run_interval: String,
    pub next_run: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = expenses)]
pub struct Expense {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub amount_cents: i64,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: NaiveDate,
    pub employee_id: Option<Uuid>,
    pub recurring_expense_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = expenses)]
pub struct NewExpense {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub amount_cents: i64,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: NaiveDate,
    pub employee_id: Option<Uuid>,
    pub recurring_expense_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = invoices)]
pub struct Invoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoices)]
pub struct NewInvoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = invoice_reminders)]
#[diesel(belongs_to(Invoice))]
pub struct InvoiceReminder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub level: i32,
    pub method: String,
    pub status: String,
    pub reminder_date: NaiveDateTime,
    pub message: Option<String>,
    pub sent_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoice_reminders)]
pub struct NewInvoiceReminder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub level: i32,
    pub method: String,
    pub status: String,
    pub reminder_date: NaiveDateTime,
    pub message: Option<String>,
}
