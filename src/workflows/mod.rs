//! Tenant-scoped business operations. Every function takes an explicit
//! connection and tenant so handlers, the maintenance CLI and tests share
//! one code path.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub mod availability;
pub mod reassignment;
pub mod recurring;
pub mod reminders;
pub mod salary;
pub mod vacation;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        ServiceError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            ServiceError::Database(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ))
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Created,
    Skipped,
    Error,
}

/// Outcome of one template or employee inside a scheduler run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub as_of: NaiveDate,
    pub processed: usize,
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
    pub results: Vec<BatchItem>,
}

impl BatchReport {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            processed: 0,
            created: 0,
            skipped: 0,
            errors: 0,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, item: BatchItem) {
        self.processed += 1;
        match item.status {
            ItemStatus::Created => self.created += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Error => self.errors += 1,
        }
        self.results.push(item);
    }

    pub fn created_expense_ids(&self) -> Vec<Uuid> {
        self.results
            .iter()
            .filter_map(|item| item.expense_id)
            .collect()
    }
}

/// What happened to a single unit of work; folded into a [`BatchItem`].
#[derive(Debug)]
pub(crate) enum UnitOutcome {
    Created(Uuid),
    Skipped(&'static str),
}

pub(crate) fn batch_item(
    id: Uuid,
    tenant_id: Uuid,
    outcome: ServiceResult<UnitOutcome>,
) -> BatchItem {
    match outcome {
        Ok(UnitOutcome::Created(expense_id)) => BatchItem {
            id,
            tenant_id,
            status: ItemStatus::Created,
            expense_id: Some(expense_id),
            message: None,
        },
        Ok(UnitOutcome::Skipped(reason)) => BatchItem {
            id,
            tenant_id,
            status: ItemStatus::Skipped,
            expense_id: None,
            message: Some(reason.to_string()),
        },
        Err(err) if err.is_unique_violation() => BatchItem {
            id,
            tenant_id,
            status: ItemStatus::Skipped,
            expense_id: None,
            message: Some("already generated".to_string()),
        },
        Err(err) => BatchItem {
            id,
            tenant_id,
            status: ItemStatus::Error,
            expense_id: None,
            message: Some(err.to_string()),
        },
    }
}
