use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::auth::CronCaller;
use crate::error::AppResult;
use crate::state::AppState;
use crate::workflows::{recurring, salary, BatchReport};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQuery {
    /// Overrides the run date; defaults to today (UTC).
    pub as_of: Option<NaiveDate>,
}

impl RunQuery {
    fn date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

pub async fn run_recurring_expenses(
    State(state): State<AppState>,
    _caller: CronCaller,
    Query(query): Query<RunQuery>,
) -> AppResult<Json<BatchReport>> {
    let as_of = query.date();
    let mut conn = state.db()?;

    let report = recurring::run_due_recurring_expenses(&mut conn, as_of)?;
    Ok(Json(report))
}

pub async fn run_salary_expenses(
    State(state): State<AppState>,
    _caller: CronCaller,
    Query(query): Query<RunQuery>,
) -> AppResult<Json<BatchReport>> {
    let today = query.date();
    let mut conn = state.db()?;

    let report = salary::run_salary_expenses(&mut conn, today)?;
    Ok(Json(report))
}
